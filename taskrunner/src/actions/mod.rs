//! Concrete Sub-Task kinds behind one capability contract.
//!
//! The [`SubTaskAction`] trait is the seam between the orchestrator and the
//! side-effecting actions. [`SubTaskKind`] is the closed set of kinds a
//! document can name; it is selected by the `type` attribute at parse time.
//! Kinds see the parameter store read-only through [`ActionContext`].

pub mod delete_file;
pub mod load_task;
pub mod run_program;
pub mod wait;
pub mod write_log;

use crate::core::status::{ActionReport, StatusTable};
use crate::core::store::ParameterStore;
use crate::orchestrator::TaskReport;
use crate::task::Task;

pub use delete_file::DeleteFile;
pub use load_task::LoadTask;
pub use run_program::RunProgram;
pub use wait::Wait;
pub use write_log::{LogLevel, WriteLog};

/// Resolved inputs for one execution of a Sub-Task.
#[derive(Debug, Clone, Copy)]
pub struct ActionInput<'a> {
    pub name: &'a str,
    pub main_value: &'a str,
    pub arguments: &'a [String],
}

/// What a running action may ask of the surrounding execution.
pub trait ActionContext {
    fn params(&self) -> &ParameterStore;
    /// Display mode: narrate to stdout.
    fn display(&self) -> bool;
    /// Run another Task synchronously, sharing this execution's state.
    fn run_nested(&mut self, task: &mut Task) -> TaskReport;
}

/// Uniform interface every concrete kind implements.
pub trait SubTaskAction {
    /// Stable one-byte type code, recorded in execution codes.
    fn type_code(&self) -> u8;
    /// Document discriminator (`type` attribute).
    fn type_name(&self) -> &'static str;
    /// Shared per-kind table, built on first use.
    fn status_table(&self) -> &'static StatusTable;
    /// Perform the action. OS errors become failure reports; nothing propagates.
    fn run(&self, input: &ActionInput<'_>, ctx: &mut dyn ActionContext) -> ActionReport;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubTaskKind {
    DeleteFile(DeleteFile),
    RunProgram(RunProgram),
    WriteLog(WriteLog),
    Wait(Wait),
    LoadTask(LoadTask),
}

impl SubTaskKind {
    pub fn action(&self) -> &dyn SubTaskAction {
        match self {
            SubTaskKind::DeleteFile(kind) => kind,
            SubTaskKind::RunProgram(kind) => kind,
            SubTaskKind::WriteLog(kind) => kind,
            SubTaskKind::Wait(kind) => kind,
            SubTaskKind::LoadTask(kind) => kind,
        }
    }

    pub fn type_code(&self) -> u8 {
        self.action().type_code()
    }

    pub fn type_name(&self) -> &'static str {
        self.action().type_name()
    }

    pub fn status_table(&self) -> &'static StatusTable {
        self.action().status_table()
    }

    pub fn run(&self, input: &ActionInput<'_>, ctx: &mut dyn ActionContext) -> ActionReport {
        self.action().run(input, ctx)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn all_kinds() -> Vec<SubTaskKind> {
        vec![
            SubTaskKind::DeleteFile(DeleteFile::default()),
            SubTaskKind::RunProgram(RunProgram::default()),
            SubTaskKind::WriteLog(WriteLog::default()),
            SubTaskKind::Wait(Wait),
            SubTaskKind::LoadTask(LoadTask),
        ]
    }

    #[test]
    fn type_codes_and_names_are_distinct() {
        let kinds = all_kinds();
        let codes: HashSet<_> = kinds.iter().map(SubTaskKind::type_code).collect();
        let names: HashSet<_> = kinds.iter().map(SubTaskKind::type_name).collect();
        assert_eq!(codes.len(), kinds.len());
        assert_eq!(names.len(), kinds.len());
    }

    #[test]
    fn every_table_carries_the_baseline() {
        for kind in all_kinds() {
            let table = kind.status_table();
            for id in [
                crate::core::status::NOT_APPLICABLE,
                crate::core::status::ERROR,
                crate::core::status::CONDITION_MISSING_FIELD,
                crate::core::status::CONDITION_INVALID_ACTION,
                crate::core::status::CONDITION_INVALID_PHASE,
            ] {
                assert!(table.get(id).is_some(), "{} lacks {id}", kind.type_name());
            }
        }
    }
}
