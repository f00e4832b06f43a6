//! Static checks for `taskrunner validate`.
//!
//! A run would terminate on the same problems; this reports all of them up
//! front instead of stopping at the first.

use std::path::Path;

use anyhow::Result;

use crate::core::condition::Condition;
use crate::core::types::Action;
use crate::io::document::load_task;
use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateOutcome {
    pub task_name: String,
    pub subtasks: usize,
    pub problems: Vec<String>,
}

/// Load a document and check every condition in it.
pub fn validate_document(path: &Path) -> Result<ValidateOutcome> {
    let task = load_task(path)?;
    Ok(ValidateOutcome {
        task_name: task.name.clone(),
        subtasks: task.subtasks().len(),
        problems: validate_task(&task),
    })
}

/// Human-readable problems, in document order. Empty means valid.
pub fn validate_task(task: &Task) -> Vec<String> {
    let mut problems = Vec::new();
    if let Some(condition) = &task.condition {
        if let Err(err) = condition.validate() {
            problems.push(format!("task condition: {err}"));
        } else if allows(condition, Action::RestartLastSubTask) {
            problems.push(
                "task condition: restart_last_subtask is only valid on a sub-task".to_string(),
            );
        }
    }
    for subtask in task.subtasks() {
        if let Some(condition) = &subtask.condition
            && let Err(err) = condition.validate()
        {
            problems.push(format!(
                "sub-task {} '{}': {err}",
                subtask.seq(),
                subtask.name
            ));
        }
    }
    problems
}

fn allows(condition: &Condition, action: Action) -> bool {
    condition.check_operation(true) == action || condition.check_operation(false) == action
}
