//! Test-only helpers for building Tasks and execution contexts.

use std::path::{Path, PathBuf};

use crate::actions::{DeleteFile, LoadTask, SubTaskKind, WriteLog};
use crate::core::condition::Condition;
use crate::core::store::{IterationLimits, ParameterStore};
use crate::io::document::save_task;
use crate::orchestrator::{ExecutionContext, RunOptions};
use crate::task::{SubTask, Task};

/// Quiet context with default ceilings and no log sink.
pub fn context() -> ExecutionContext {
    ExecutionContext::new(ParameterStore::default(), RunOptions::default())
}

/// Context with explicit iteration ceilings and run options.
pub fn context_with(limits: IterationLimits, options: RunOptions) -> ExecutionContext {
    ExecutionContext::new(ParameterStore::new(limits), options)
}

pub fn limits(max_task_iterations: u32, max_subtask_iterations: u32) -> IterationLimits {
    IterationLimits {
        max_task_iterations,
        max_subtask_iterations,
    }
}

/// A Sub-Task that always succeeds.
pub fn note(name: &str) -> SubTask {
    SubTask::new(
        name,
        SubTaskKind::WriteLog(WriteLog::default()),
        format!("{name} ran"),
    )
}

/// A Sub-Task that always fails: it deletes a file that does not exist.
pub fn failing(name: &str, dir: &Path) -> SubTask {
    let path = dir.join(format!("{name}.absent"));
    SubTask::new(
        name,
        SubTaskKind::DeleteFile(DeleteFile::default()),
        path.to_string_lossy(),
    )
}

pub fn load(name: &str, path: &Path) -> SubTask {
    SubTask::new(name, SubTaskKind::LoadTask(LoadTask), path.to_string_lossy())
}

pub fn pre(expression: &str, action: &str, default: &str) -> Condition {
    Condition::new("pre", expression, action, default)
}

pub fn post(expression: &str, action: &str, default: &str) -> Condition {
    Condition::new("post", expression, action, default)
}

/// Build a Task from Sub-Tasks in order.
pub fn task(name: &str, subtasks: Vec<SubTask>) -> Task {
    subtasks
        .into_iter()
        .fold(Task::builder(name), |builder, subtask| builder.subtask(subtask))
        .build()
        .expect("build task")
}

/// Temporary directory holding documents and files for one test.
pub struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Save `task` as a document named `file` and return its path.
    pub fn write_task(&self, file: &str, task: &Task) -> PathBuf {
        let path = self.dir.path().join(file);
        save_task(&path, task).expect("save task");
        path
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}
