//! Per-kind status-code tables.
//!
//! Every Sub-Task kind owns one table, built once before first use. Codes are
//! numbered independently inside each [`StatusClass`] starting at 1; the
//! terminal class reserves 0 for the shared `not_applicable` marker.

use crate::core::types::{Outcome, StatusClass};

pub const NOT_APPLICABLE: &str = "not_applicable";
pub const ERROR: &str = "error";
pub const CONDITION_MISSING_FIELD: &str = "condition_missing_field";
pub const CONDITION_INVALID_ACTION: &str = "condition_invalid_action";
pub const CONDITION_INVALID_PHASE: &str = "condition_invalid_phase";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCodeEntry {
    pub id: &'static str,
    pub code: u8,
    pub class: StatusClass,
    pub description: &'static str,
}

impl StatusCodeEntry {
    /// Outcome implied by this status.
    pub fn outcome(&self) -> Outcome {
        match self.class {
            StatusClass::Success => Outcome::Success,
            StatusClass::Failure => Outcome::Failure,
            StatusClass::Terminal if self.code == 0 => Outcome::None,
            StatusClass::Terminal => Outcome::Skipped,
        }
    }
}

/// What a Sub-Task reports back after `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReport {
    pub outcome: Outcome,
    pub status: StatusCodeEntry,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct StatusTable {
    entries: Vec<StatusCodeEntry>,
}

impl StatusTable {
    /// Start a table pre-populated with the shared baseline ids.
    pub fn builder() -> StatusTableBuilder {
        StatusTableBuilder {
            entries: vec![StatusCodeEntry {
                id: NOT_APPLICABLE,
                code: 0,
                class: StatusClass::Terminal,
                description: "not applicable",
            }],
        }
        .failure(ERROR, "unexpected error")
        .failure(CONDITION_MISSING_FIELD, "condition is missing a field")
        .failure(CONDITION_INVALID_ACTION, "condition has an unknown action")
        .failure(CONDITION_INVALID_PHASE, "condition has an unknown type")
    }

    pub fn get(&self, id: &str) -> Option<&StatusCodeEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn entries(&self) -> &[StatusCodeEntry] {
        &self.entries
    }

    /// Build a report for `id`. Unknown ids collapse to the generic `error`.
    pub fn set_status(&self, id: &str, message: impl Into<String>) -> ActionReport {
        let message = message.into();
        let status = match self.get(id) {
            Some(entry) => *entry,
            None => {
                tracing::warn!(id, "unknown status id, reporting generic error");
                self.error_entry()
            }
        };
        ActionReport {
            outcome: status.outcome(),
            status,
            message,
        }
    }

    fn error_entry(&self) -> StatusCodeEntry {
        self.get(ERROR).copied().unwrap_or(StatusCodeEntry {
            id: ERROR,
            code: 1,
            class: StatusClass::Failure,
            description: "unexpected error",
        })
    }
}

pub struct StatusTableBuilder {
    entries: Vec<StatusCodeEntry>,
}

impl StatusTableBuilder {
    pub fn success(self, id: &'static str, description: &'static str) -> Self {
        self.push(id, StatusClass::Success, description)
    }

    pub fn failure(self, id: &'static str, description: &'static str) -> Self {
        self.push(id, StatusClass::Failure, description)
    }

    pub fn skipped(self, id: &'static str, description: &'static str) -> Self {
        self.push(id, StatusClass::Terminal, description)
    }

    pub fn build(self) -> StatusTable {
        StatusTable {
            entries: self.entries,
        }
    }

    fn push(mut self, id: &'static str, class: StatusClass, description: &'static str) -> Self {
        debug_assert!(
            self.entries.iter().all(|entry| entry.id != id),
            "duplicate status id {id}"
        );
        let next = self
            .entries
            .iter()
            .filter(|entry| entry.class == class)
            .map(|entry| entry.code)
            .max()
            .map_or(1, |code| code.saturating_add(1));
        self.entries.push(StatusCodeEntry {
            id,
            code: next,
            class,
            description,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn sample() -> StatusTable {
        StatusTable::builder()
            .success("deleted", "file removed")
            .failure("not_found", "file missing")
            .skipped("already_absent", "nothing to delete")
            .success("kept", "file kept")
            .build()
    }

    #[test]
    fn baseline_ids_have_fixed_codes() {
        let table = sample();
        let code = |id: &str| table.get(id).map(|entry| (entry.class, entry.code));
        assert_eq!(code(NOT_APPLICABLE), Some((StatusClass::Terminal, 0)));
        assert_eq!(code(ERROR), Some((StatusClass::Failure, 1)));
        assert_eq!(code(CONDITION_MISSING_FIELD), Some((StatusClass::Failure, 2)));
        assert_eq!(code(CONDITION_INVALID_ACTION), Some((StatusClass::Failure, 3)));
        assert_eq!(code(CONDITION_INVALID_PHASE), Some((StatusClass::Failure, 4)));
    }

    #[test]
    fn codes_are_numbered_per_class() {
        let table = sample();
        assert_eq!(table.get("deleted").map(|e| e.code), Some(1));
        assert_eq!(table.get("kept").map(|e| e.code), Some(2));
        assert_eq!(table.get("not_found").map(|e| e.code), Some(5));
        assert_eq!(table.get("already_absent").map(|e| e.code), Some(1));

        let unique: HashSet<_> = table.entries().iter().map(|e| (e.class, e.code)).collect();
        assert_eq!(unique.len(), table.entries().len());
    }

    #[test]
    fn set_status_maps_class_to_outcome() {
        let table = sample();
        assert_eq!(table.set_status("deleted", "ok").outcome, Outcome::Success);
        assert_eq!(table.set_status("not_found", "gone").outcome, Outcome::Failure);
        assert_eq!(
            table.set_status("already_absent", "").outcome,
            Outcome::Skipped
        );
        assert_eq!(table.set_status(NOT_APPLICABLE, "").outcome, Outcome::None);

        let unknown = table.set_status("bogus", "what");
        assert_eq!(unknown.status.id, ERROR);
        assert_eq!(unknown.outcome, Outcome::Failure);
        assert_eq!(unknown.message, "what");
    }
}
