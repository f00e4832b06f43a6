//! Deterministic, pure logic shared by the runner core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod condition;
pub mod evaluator;
pub mod expr;
pub mod param;
pub mod status;
pub mod store;
pub mod types;
