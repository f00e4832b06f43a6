//! `loadTask`: load another document and run it as a nested Task.
//!
//! The nested run shares the caller's parameter store and iteration
//! counters, so loading the same document recursively is bounded by the
//! task iteration ceiling.

use std::path::Path;
use std::sync::LazyLock;

use tracing::{info, instrument};

use crate::actions::{ActionContext, ActionInput, SubTaskAction};
use crate::core::status::{ActionReport, StatusTable};
use crate::io::document::load_task;
use crate::orchestrator::TaskOutcome;

pub const TYPE_CODE: u8 = 0x05;
pub const TYPE_NAME: &str = "loadTask";

static STATUS: LazyLock<StatusTable> = LazyLock::new(|| {
    StatusTable::builder()
        .success("nested_success", "nested task succeeded")
        .failure("missing_path", "no document path was given")
        .failure("load_failed", "nested document could not be loaded")
        .failure("nested_failure", "nested task failed")
        .failure("nested_terminated", "nested task was terminated")
        .skipped("nested_skipped", "nested task was skipped")
        .build()
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadTask;

impl SubTaskAction for LoadTask {
    fn type_code(&self) -> u8 {
        TYPE_CODE
    }

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn status_table(&self) -> &'static StatusTable {
        &STATUS
    }

    #[instrument(skip_all, fields(path = input.main_value))]
    fn run(&self, input: &ActionInput<'_>, ctx: &mut dyn ActionContext) -> ActionReport {
        let table = self.status_table();
        if input.main_value.trim().is_empty() {
            return table.set_status("missing_path", "no document path given");
        }
        let path = Path::new(input.main_value);
        let mut task = match load_task(path) {
            Ok(task) => task,
            Err(err) => return table.set_status("load_failed", format!("{err:#}")),
        };
        info!(task = %task.name, "running nested task");
        let report = ctx.run_nested(&mut task);
        let summary = format!(
            "{}: {} ({})",
            task.name,
            report.outcome,
            report.stop.as_str()
        );
        let id = match report.outcome {
            TaskOutcome::Success => "nested_success",
            TaskOutcome::Failure => "nested_failure",
            TaskOutcome::Skipped => "nested_skipped",
            TaskOutcome::Terminated => "nested_terminated",
        };
        table.set_status(id, summary)
    }
}
