//! Shared deterministic types for task orchestration.
//!
//! These types define stable contracts between the parameter store, the
//! condition model, the concrete Sub-Task kinds, and the orchestrator. They
//! must not depend on external state or I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of running one Sub-Task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
    Skipped,
    None,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Skipped => "skipped",
            Outcome::None => "none",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome class a status code belongs to.
///
/// Codes are numbered independently inside each class. `Terminal` covers
/// both skipped outcomes and the literal not-applicable marker (code 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    Success,
    Failure,
    Terminal,
}

impl StatusClass {
    /// Byte stored in the third slot of an [`ExecutionCode`].
    pub fn code(self) -> u8 {
        match self {
            StatusClass::Terminal => 0x00,
            StatusClass::Success => 0x01,
            StatusClass::Failure => 0x02,
        }
    }
}

/// Control-flow decision produced by resolving a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Run,
    Skip,
    Exit,
    RestartTask,
    RestartLastSubTask,
    /// Unrecognized, empty, or missing token. Treated as a configuration error.
    None,
}

impl Action {
    /// Case-insensitive token lookup; anything unknown maps to [`Action::None`].
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "run" => Action::Run,
            "skip" => Action::Skip,
            "exit" => Action::Exit,
            "restart_task" => Action::RestartTask,
            "restart_last_subtask" => Action::RestartLastSubTask,
            _ => Action::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Run => "run",
            Action::Skip => "skip",
            Action::Exit => "exit",
            Action::RestartTask => "restart_task",
            Action::RestartLastSubTask => "restart_last_subtask",
            Action::None => "none",
        }
    }
}

/// When a condition is applied relative to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pre,
    Post,
    None,
}

impl Phase {
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "pre" => Phase::Pre,
            "post" => Phase::Post,
            _ => Phase::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Pre => "pre",
            Phase::Post => "post",
            Phase::None => "none",
        }
    }
}

/// Run-mode flags packed into the first byte of an [`ExecutionCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunMode {
    pub display: bool,
    pub halt_on_error: bool,
    pub nested: bool,
}

impl RunMode {
    pub fn code(self) -> u8 {
        let mut byte = 0u8;
        if self.display {
            byte |= 0x01;
        }
        if self.halt_on_error {
            byte |= 0x02;
        }
        if self.nested {
            byte |= 0x04;
        }
        byte
    }
}

/// 4-byte packed record: `[run mode][sub-task type][outcome class][status code]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionCode(pub [u8; 4]);

impl ExecutionCode {
    pub fn new(mode: RunMode, type_code: u8, class: StatusClass, status: u8) -> Self {
        Self([mode.code(), type_code, class.code(), status])
    }

    pub fn bytes(self) -> [u8; 4] {
        self.0
    }
}

impl fmt::Display for ExecutionCode {
    /// Eight uppercase hex characters, no separators.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_tokens_parse_in_any_case() {
        let cases = [
            ("run", Action::Run),
            ("SKIP", Action::Skip),
            ("Exit", Action::Exit),
            ("Restart_Task", Action::RestartTask),
            ("RESTART_LAST_SUBTASK", Action::RestartLastSubTask),
        ];
        for (token, expected) in cases {
            assert_eq!(Action::parse(token), expected, "token {token}");
        }
    }

    #[test]
    fn unknown_or_empty_action_is_none() {
        assert_eq!(Action::parse(""), Action::None);
        assert_eq!(Action::parse("   "), Action::None);
        assert_eq!(Action::parse("restart"), Action::None);
    }

    #[test]
    fn phase_tokens_parse() {
        assert_eq!(Phase::parse("PRE"), Phase::Pre);
        assert_eq!(Phase::parse("post"), Phase::Post);
        assert_eq!(Phase::parse(""), Phase::None);
        assert_eq!(Phase::parse("during"), Phase::None);
    }

    #[test]
    fn execution_code_renders_as_eight_hex_chars() {
        let mode = RunMode {
            display: true,
            halt_on_error: true,
            nested: false,
        };
        let code = ExecutionCode::new(mode, 0x0A, StatusClass::Failure, 0xFF);
        assert_eq!(code.to_string(), "030A02FF");
        assert_eq!(code.bytes(), [0x03, 0x0A, 0x02, 0xFF]);
    }
}
