//! I/O helpers: settings, config documents, the execution log, processes.

pub mod config;
pub mod document;
pub mod log_sink;
pub mod process;
