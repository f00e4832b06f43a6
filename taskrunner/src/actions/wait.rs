//! `wait`: block the control thread for a number of milliseconds.

use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use crate::actions::{ActionContext, ActionInput, SubTaskAction};
use crate::core::status::{ActionReport, StatusTable};

pub const TYPE_CODE: u8 = 0x04;
pub const TYPE_NAME: &str = "wait";

static STATUS: LazyLock<StatusTable> = LazyLock::new(|| {
    StatusTable::builder()
        .success("elapsed", "wait completed")
        .failure("invalid_duration", "duration is not a whole number of milliseconds")
        .build()
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wait;

impl SubTaskAction for Wait {
    fn type_code(&self) -> u8 {
        TYPE_CODE
    }

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn status_table(&self) -> &'static StatusTable {
        &STATUS
    }

    fn run(&self, input: &ActionInput<'_>, _ctx: &mut dyn ActionContext) -> ActionReport {
        let table = self.status_table();
        let Ok(millis) = input.main_value.trim().parse::<u64>() else {
            return table.set_status(
                "invalid_duration",
                format!("`{}` is not a duration in milliseconds", input.main_value),
            );
        };
        thread::sleep(Duration::from_millis(millis));
        table.set_status("elapsed", format!("waited {millis} ms"))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::core::types::Outcome;
    use crate::test_support::context;

    fn run(value: &str) -> ActionReport {
        let input = ActionInput {
            name: "pause",
            main_value: value,
            arguments: &[],
        };
        Wait.run(&input, &mut context())
    }

    #[test]
    fn sleeps_for_the_given_duration() {
        let started = Instant::now();
        let report = run(" 30 ");
        assert_eq!(report.outcome, Outcome::Success);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn rejects_non_numeric_duration() {
        assert_eq!(run("soon").status.id, "invalid_duration");
        assert_eq!(run("-5").outcome, Outcome::Failure);
    }
}
