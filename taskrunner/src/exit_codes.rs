//! Stable exit codes for taskrunner CLI commands.

use crate::orchestrator::TaskOutcome;

/// Task succeeded, or the document is valid.
pub const OK: i32 = 0;
/// At least one Sub-Task failed.
pub const FAILURE: i32 = 1;
/// The Task was skipped (disabled, condition skip, sub-task ceiling).
pub const SKIPPED: i32 = 2;
/// The Task was terminated (exit action, invalid condition, task ceiling).
pub const TERMINATED: i32 = 3;
/// Bad input: unreadable settings or document, invalid parameter, invalid condition.
pub const INVALID: i32 = 4;

pub fn for_outcome(outcome: TaskOutcome) -> i32 {
    match outcome {
        TaskOutcome::Success => OK,
        TaskOutcome::Failure => FAILURE,
        TaskOutcome::Skipped => SKIPPED,
        TaskOutcome::Terminated => TERMINATED,
    }
}
