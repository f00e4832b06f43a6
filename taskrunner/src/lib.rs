//! Declarative maintenance-task runner.
//!
//! A config document describes a Task: an ordered list of Sub-Tasks, each
//! guarded by optional pre/post conditions that decide whether to run, skip,
//! restart or stop. The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (parameters, expressions,
//!   conditions, status tables). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (settings, documents, the
//!   execution log, child processes).
//!
//! [`orchestrator`] drives a [`task::Task`] through its state machine and
//! [`actions`] provides the concrete Sub-Task kinds.

pub mod actions;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrator;
pub mod task;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
