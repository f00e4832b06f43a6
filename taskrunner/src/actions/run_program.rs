//! `runProgram`: launch an external program with the Sub-Task arguments.

use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::actions::{ActionContext, ActionInput, SubTaskAction};
use crate::core::status::{ActionReport, StatusTable};
use crate::io::process::{run_with_timeout, spawn_detached};

pub const TYPE_CODE: u8 = 0x02;
pub const TYPE_NAME: &str = "runProgram";

pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
const OUTPUT_LIMIT_BYTES: usize = 64 * 1024;

static STATUS: LazyLock<StatusTable> = LazyLock::new(|| {
    StatusTable::builder()
        .success("exited_zero", "program exited with status 0")
        .success("started", "program started without waiting")
        .failure("missing_program", "no program was given")
        .failure("spawn_failed", "program could not be started")
        .failure("nonzero_exit", "program exited with a non-zero status")
        .failure("timed_out", "program exceeded its timeout")
        .build()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunProgram {
    /// Wait for the program to exit.
    pub wait: bool,
    /// Upper bound on the wait, in seconds.
    pub timeout_secs: u64,
}

impl Default for RunProgram {
    fn default() -> Self {
        Self {
            wait: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl SubTaskAction for RunProgram {
    fn type_code(&self) -> u8 {
        TYPE_CODE
    }

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn status_table(&self) -> &'static StatusTable {
        &STATUS
    }

    #[instrument(skip_all, fields(program = input.main_value, wait = self.wait))]
    fn run(&self, input: &ActionInput<'_>, _ctx: &mut dyn ActionContext) -> ActionReport {
        let table = self.status_table();
        let program = input.main_value.trim();
        if program.is_empty() {
            return table.set_status("missing_program", "no program given");
        }
        let mut cmd = Command::new(program);
        cmd.args(input.arguments);

        if !self.wait {
            return match spawn_detached(cmd) {
                Ok(pid) => table.set_status("started", format!("{program} started (pid {pid})")),
                Err(err) => table.set_status("spawn_failed", format!("{program}: {err:#}")),
            };
        }

        let output = match run_with_timeout(
            cmd,
            Duration::from_secs(self.timeout_secs),
            OUTPUT_LIMIT_BYTES,
        ) {
            Ok(output) => output,
            Err(err) => return table.set_status("spawn_failed", format!("{program}: {err:#}")),
        };
        debug!(
            stdout = %String::from_utf8_lossy(&output.stdout),
            "program output"
        );
        if output.timed_out {
            return table.set_status(
                "timed_out",
                format!("{program} killed after {}s", self.timeout_secs),
            );
        }
        if output.status.success() {
            return table.set_status("exited_zero", format!("{program} exited with 0"));
        }
        let code = output
            .status
            .code()
            .map_or_else(|| "a signal".to_string(), |code| code.to_string());
        let message = match output.stderr_tail() {
            Some(tail) => format!("{program} exited with {code}: {tail}"),
            None => format!("{program} exited with {code}"),
        };
        table.set_status("nonzero_exit", message)
    }
}
