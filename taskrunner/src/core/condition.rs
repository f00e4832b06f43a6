//! Declarative guarded branch attached to a Task or Sub-Task.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::evaluator;
use crate::core::store::ParameterStore;
use crate::core::types::{Action, Phase};

/// Structural problems found while validating a [`Condition`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("condition is missing the `{0}` field")]
    MissingField(&'static str),
    #[error("condition {field} `{token}` is not a known action")]
    InvalidAction { field: &'static str, token: String },
    #[error("condition type `{0}` is neither `pre` nor `post`")]
    InvalidPhase(String),
}

impl ConditionError {
    /// Baseline status id every Sub-Task kind registers for this problem.
    pub fn status_id(&self) -> &'static str {
        match self {
            ConditionError::MissingField(_) => "condition_missing_field",
            ConditionError::InvalidAction { .. } => "condition_invalid_action",
            ConditionError::InvalidPhase(_) => "condition_invalid_phase",
        }
    }
}

/// `{expression, action, default action, phase}` as written in the document.
///
/// Fields stay raw strings; they are interpreted on use and validated as a
/// whole before the expression is ever evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "@type", default)]
    pub phase: String,
    #[serde(rename = "@action", default)]
    pub action: String,
    #[serde(rename = "@default", default)]
    pub default_action: String,
    #[serde(rename = "@expression", default)]
    pub expression: String,
}

impl Condition {
    pub fn new(
        phase: impl Into<String>,
        expression: impl Into<String>,
        action: impl Into<String>,
        default_action: impl Into<String>,
    ) -> Self {
        Self {
            phase: phase.into(),
            action: action.into(),
            default_action: default_action.into(),
            expression: expression.into(),
        }
    }

    /// Resolve the action for one branch: `action` when true, `default` otherwise.
    pub fn check_operation(&self, use_true_branch: bool) -> Action {
        if use_true_branch {
            Action::parse(&self.action)
        } else {
            Action::parse(&self.default_action)
        }
    }

    pub fn check_type(&self) -> Phase {
        Phase::parse(&self.phase)
    }

    /// Reject empty fields and unknown action/phase tokens.
    pub fn validate(&self) -> Result<(), ConditionError> {
        for (field, value) in [
            ("expression", &self.expression),
            ("action", &self.action),
            ("default", &self.default_action),
            ("type", &self.phase),
        ] {
            if value.trim().is_empty() {
                return Err(ConditionError::MissingField(field));
            }
        }
        for (field, token) in [("action", &self.action), ("default", &self.default_action)] {
            if Action::parse(token) == Action::None {
                return Err(ConditionError::InvalidAction {
                    field,
                    token: token.clone(),
                });
            }
        }
        if self.check_type() == Phase::None {
            return Err(ConditionError::InvalidPhase(self.phase.clone()));
        }
        Ok(())
    }

    /// Evaluate the expression against the live store. Errors read as `false`.
    pub fn evaluate(&self, params: &ParameterStore, verbose: bool) -> bool {
        evaluator::evaluate(&self.expression, params, verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(action: &str, default: &str, phase: &str) -> Condition {
        Condition::new(phase, "1 = 1", action, default)
    }

    #[test]
    fn check_operation_picks_branch() {
        let cond = condition("Restart_Last_SubTask", "EXIT", "pre");
        assert_eq!(cond.check_operation(true), Action::RestartLastSubTask);
        assert_eq!(cond.check_operation(false), Action::Exit);
    }

    #[test]
    fn unknown_tokens_resolve_to_none() {
        let cond = condition("jump", "", "pre");
        assert_eq!(cond.check_operation(true), Action::None);
        assert_eq!(cond.check_operation(false), Action::None);
        assert_eq!(condition("run", "run", "later").check_type(), Phase::None);
    }

    #[test]
    fn validate_reports_first_problem() {
        assert_eq!(condition("run", "skip", "post").validate(), Ok(()));

        let missing = Condition::new("pre", "", "run", "skip");
        assert_eq!(
            missing.validate(),
            Err(ConditionError::MissingField("expression"))
        );
        assert_eq!(
            condition("run", "skip", " ").validate(),
            Err(ConditionError::MissingField("type"))
        );

        let bad_default = condition("run", "later", "pre").validate().unwrap_err();
        assert_eq!(bad_default.status_id(), "condition_invalid_action");

        let bad_phase = condition("run", "skip", "during").validate().unwrap_err();
        assert_eq!(bad_phase, ConditionError::InvalidPhase("during".to_string()));
        assert_eq!(bad_phase.status_id(), "condition_invalid_phase");
    }

    #[test]
    fn evaluate_uses_the_store() {
        let store = ParameterStore::default();
        assert!(Condition::new("pre", "2 > 1", "run", "exit").evaluate(&store, false));
        assert!(!Condition::new("pre", "2 <", "run", "exit").evaluate(&store, false));
    }
}
