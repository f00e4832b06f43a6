//! `writeLog`: emit a message as a diagnostic event.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use tracing::{debug, error, info, trace, warn};

use crate::actions::{ActionContext, ActionInput, SubTaskAction};
use crate::core::status::{ActionReport, StatusTable};

pub const TYPE_CODE: u8 = 0x03;
pub const TYPE_NAME: &str = "writeLog";

static STATUS: LazyLock<StatusTable> = LazyLock::new(|| {
    StatusTable::builder()
        .success("written", "message emitted")
        .skipped("empty_message", "nothing to write")
        .build()
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteLog {
    pub level: LogLevel,
}

impl SubTaskAction for WriteLog {
    fn type_code(&self) -> u8 {
        TYPE_CODE
    }

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn status_table(&self) -> &'static StatusTable {
        &STATUS
    }

    fn run(&self, input: &ActionInput<'_>, ctx: &mut dyn ActionContext) -> ActionReport {
        let table = self.status_table();
        let message = input.main_value;
        if message.trim().is_empty() {
            return table.set_status("empty_message", "empty message");
        }
        let subtask = input.name;
        match self.level {
            LogLevel::Trace => trace!(subtask, "{message}"),
            LogLevel::Debug => debug!(subtask, "{message}"),
            LogLevel::Info => info!(subtask, "{message}"),
            LogLevel::Warn => warn!(subtask, "{message}"),
            LogLevel::Error => error!(subtask, "{message}"),
        }
        if ctx.display() {
            println!("[{}] {message}", self.level);
        }
        table.set_status("written", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Outcome;
    use crate::test_support::context;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!(" error ".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn message_is_reported_back() {
        let input = ActionInput {
            name: "note",
            main_value: "cleanup finished",
            arguments: &[],
        };
        let report = WriteLog::default().run(&input, &mut context());
        assert_eq!(report.outcome, Outcome::Success);
        assert_eq!(report.message, "cleanup finished");
    }

    #[test]
    fn empty_message_is_skipped() {
        let input = ActionInput {
            name: "note",
            main_value: "  ",
            arguments: &[],
        };
        let report = WriteLog::default().run(&input, &mut context());
        assert_eq!(report.outcome, Outcome::Skipped);
    }
}
