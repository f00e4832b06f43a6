//! Category-partitioned parameter registry plus iteration bookkeeping.
//!
//! The store is owned by the execution context and threaded by reference
//! through the orchestrator. Sub-Task kinds only ever see `&ParameterStore`.
//! Nested Task runs reuse the same store; this is sound because nested runs
//! are synchronous and never overlap.

use std::collections::HashMap;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, warn};

use crate::core::param::{Category, ParamValue, Parameter};

/// Well-known parameter names.
pub mod names {
    pub const SYSTEM_TIME_START: &str = "SYSTEM_TIME_START";
    pub const SYSTEM_TIME_CURRENT: &str = "SYSTEM_TIME_CURRENT";
    pub const SYSTEM_USER_NAME: &str = "SYSTEM_USER_NAME";
    pub const SYSTEM_MACHINE_NAME: &str = "SYSTEM_MACHINE_NAME";
    pub const SYSTEM_OS: &str = "SYSTEM_OS";
    pub const SYSTEM_WORKING_DIR: &str = "SYSTEM_WORKING_DIR";

    pub const ENV_MAX_TASK_ITERATIONS: &str = "ENV_MAX_TASK_ITERATIONS";
    pub const ENV_MAX_SUBTASK_ITERATIONS: &str = "ENV_MAX_SUBTASK_ITERATIONS";
    pub const ENV_SUPPRESS_LOG: &str = "ENV_SUPPRESS_LOG";

    pub const TASK_NAME: &str = "TASK_NAME";
    pub const TASK_ATTEMPT: &str = "TASK_ATTEMPT";
    pub const TASK_SUCCESS_COUNT: &str = "TASK_SUCCESS_COUNT";
    pub const TASK_FAILURE_COUNT: &str = "TASK_FAILURE_COUNT";
    pub const TASK_LAST_SUCCESS: &str = "TASK_LAST_SUCCESS";
    pub const TASK_LAST_SUCCESS_PARTIAL: &str = "TASK_LAST_SUCCESS_PARTIAL";
    pub const TASK_CONDITION_EXPRESSION: &str = "TASK_CONDITION_EXPRESSION";
    pub const TASK_CONDITION_RESULT: &str = "TASK_CONDITION_RESULT";
    pub const TASK_CONDITION_ACTION: &str = "TASK_CONDITION_ACTION";

    pub const SUBTASK_NAME: &str = "SUBTASK_NAME";
    pub const SUBTASK_EXECUTED_COUNT: &str = "SUBTASK_EXECUTED_COUNT";
    pub const SUBTASK_SUCCESS_COUNT: &str = "SUBTASK_SUCCESS_COUNT";
    pub const SUBTASK_FAILURE_COUNT: &str = "SUBTASK_FAILURE_COUNT";
    pub const SUBTASK_SKIPPED_COUNT: &str = "SUBTASK_SKIPPED_COUNT";
    pub const SUBTASK_LAST_SUCCESS: &str = "SUBTASK_LAST_SUCCESS";
    pub const SUBTASK_LAST_STATUS: &str = "SUBTASK_LAST_STATUS";
    pub const SUBTASK_ANY_SUCCESS: &str = "SUBTASK_ANY_SUCCESS";
    pub const SUBTASK_ANY_FAILURE: &str = "SUBTASK_ANY_FAILURE";
    pub const SUBTASK_CONDITION_EXPRESSION: &str = "SUBTASK_CONDITION_EXPRESSION";
    pub const SUBTASK_CONDITION_RESULT: &str = "SUBTASK_CONDITION_RESULT";
    pub const SUBTASK_CONDITION_ACTION: &str = "SUBTASK_CONDITION_ACTION";
}

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Iteration ceilings used to seed the overridable environment parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationLimits {
    pub max_task_iterations: u32,
    pub max_subtask_iterations: u32,
}

impl Default for IterationLimits {
    fn default() -> Self {
        Self {
            max_task_iterations: DEFAULT_MAX_ITERATIONS,
            max_subtask_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Insertion-ordered parameters of one category.
#[derive(Debug, Clone, Default)]
struct ParamTable {
    entries: Vec<Parameter>,
}

impl ParamTable {
    fn get(&self, name: &str) -> Option<&Parameter> {
        self.entries.iter().find(|p| p.name() == name)
    }

    fn upsert(&mut self, param: Parameter) {
        match self.entries.iter_mut().find(|p| p.name() == param.name()) {
            Some(slot) => *slot = param,
            None => self.entries.push(param),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParameterStore {
    tables: HashMap<Category, ParamTable>,
    task_iterations: HashMap<String, u32>,
    subtask_iterations: HashMap<String, u32>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(IterationLimits::default())
    }
}

impl ParameterStore {
    /// Create a store with the full catalogue of built-in parameters.
    pub fn new(limits: IterationLimits) -> Self {
        let mut store = Self {
            tables: HashMap::new(),
            task_iterations: HashMap::new(),
            subtask_iterations: HashMap::new(),
        };
        store.seed_system();
        store.seed_environment(limits);
        store.seed_task();
        store.seed_subtask();
        store
    }

    /// Category-scoped lookup. Absent names yield an invalid parameter.
    pub fn get(&self, name: &str, category: Category) -> Parameter {
        self.tables
            .get(&category)
            .and_then(|table| table.get(name))
            .cloned()
            .unwrap_or_else(|| Parameter::invalid(name, category))
    }

    /// Register a user-supplied parameter.
    ///
    /// Rejects invalid parameters, names outside `[A-Za-z0-9_]+`, and names
    /// owned by a read-only category. A name that matches an environment
    /// parameter overrides it, but only with a value of the same type.
    pub fn register_user(&mut self, param: Parameter) -> bool {
        if !param.is_valid() {
            warn!(name = param.name(), "rejecting invalid user parameter");
            return false;
        }
        if !is_identifier(param.name()) {
            warn!(name = param.name(), "rejecting user parameter with invalid name");
            return false;
        }
        for category in [Category::System, Category::Task, Category::SubTask] {
            if self.get(param.name(), category).is_valid() {
                warn!(name = param.name(), ?category, "user parameter collides with read-only parameter");
                return false;
            }
        }
        let existing = self.get(param.name(), Category::Environment);
        if existing.is_valid() {
            if existing.kind() != param.kind() {
                warn!(
                    name = param.name(),
                    expected = ?existing.kind(),
                    got = ?param.kind(),
                    "environment override has mismatched type"
                );
                return false;
            }
            debug!(name = param.name(), "overriding environment parameter");
            self.table_mut(Category::Environment)
                .upsert(param.with_category(Category::Environment));
            return true;
        }
        debug!(name = param.name(), "registering user parameter");
        self.table_mut(Category::User)
            .upsert(param.with_category(Category::User));
        true
    }

    /// Replace the value of a built-in (non-user) parameter.
    ///
    /// Unknown keys are ignored with a diagnostic.
    pub fn update_system(&mut self, key: &str, value: ParamValue) {
        for category in [
            Category::System,
            Category::Environment,
            Category::Task,
            Category::SubTask,
        ] {
            let table = self.table_mut(category);
            if let Some(existing) = table.get(key) {
                let updated = existing.with_value(value);
                table.upsert(updated);
                return;
            }
        }
        warn!(key, "update of unregistered system parameter ignored");
    }

    /// Valid parameters in substitution order: built-in categories first,
    /// user parameters last, each in registration order.
    pub fn substitution_order(&self) -> impl Iterator<Item = &Parameter> {
        Category::SUBSTITUTION_ORDER
            .iter()
            .filter_map(|category| self.tables.get(category))
            .flat_map(|table| table.entries.iter())
            .filter(|param| param.is_valid())
    }

    pub fn number(&self, name: &str, category: Category) -> Option<f64> {
        match self.get(name, category).value() {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str, category: Category) -> Option<bool> {
        match self.get(name, category).value() {
            ParamValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Register a Task identity for iteration tracking.
    ///
    /// First sighting seeds a zero count for the Task and every Sub-Task.
    /// Later sightings bump only the Task count.
    pub fn register_task<I, S>(&mut self, task_id: &str, subtask_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.task_iterations.get_mut(task_id) {
            Some(count) => {
                *count += 1;
                debug!(task_id, count = *count, "task seen again");
            }
            None => {
                self.task_iterations.insert(task_id.to_string(), 0);
                for id in subtask_ids {
                    self.subtask_iterations.insert(id.into(), 0);
                }
                debug!(task_id, "task registered");
            }
        }
    }

    /// Count one more Task iteration; `false` once the ceiling is reached.
    pub fn check_task_iteration(&mut self, task_id: &str) -> bool {
        let ceiling = self.ceiling(names::ENV_MAX_TASK_ITERATIONS);
        bump_and_check(&mut self.task_iterations, task_id, ceiling)
    }

    /// Count one more Sub-Task iteration; `false` once the ceiling is reached.
    pub fn check_subtask_iteration(&mut self, subtask_id: &str) -> bool {
        let ceiling = self.ceiling(names::ENV_MAX_SUBTASK_ITERATIONS);
        bump_and_check(&mut self.subtask_iterations, subtask_id, ceiling)
    }

    /// Zero a known Sub-Task counter at the start of a fresh pre-check cycle.
    pub(crate) fn reset_subtask_iteration(&mut self, subtask_id: &str) {
        if let Some(count) = self.subtask_iterations.get_mut(subtask_id) {
            *count = 0;
        }
    }

    pub fn task_iterations(&self, task_id: &str) -> Option<u32> {
        self.task_iterations.get(task_id).copied()
    }

    pub fn subtask_iterations(&self, subtask_id: &str) -> Option<u32> {
        self.subtask_iterations.get(subtask_id).copied()
    }

    fn ceiling(&self, name: &str) -> u32 {
        // `as` saturates: negatives and `min` become 0, which denies every check.
        self.number(name, Category::Environment)
            .map_or(DEFAULT_MAX_ITERATIONS, |n| n as u32)
    }

    fn table_mut(&mut self, category: Category) -> &mut ParamTable {
        self.tables.entry(category).or_default()
    }

    fn insert(&mut self, category: Category, name: &str, value: ParamValue) {
        self.table_mut(category)
            .upsert(Parameter::new(name, value, category));
    }

    fn seed_system(&mut self) {
        let now = now();
        let user = env_first(&["USER", "USERNAME"]);
        let machine = env_first(&["HOSTNAME", "COMPUTERNAME"]);
        let cwd = std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default();
        let system = [
            (names::SYSTEM_TIME_START, ParamValue::Timestamp(now)),
            (names::SYSTEM_TIME_CURRENT, ParamValue::Timestamp(now)),
            (names::SYSTEM_USER_NAME, ParamValue::String(user)),
            (names::SYSTEM_MACHINE_NAME, ParamValue::String(machine)),
            (
                names::SYSTEM_OS,
                ParamValue::String(std::env::consts::OS.to_string()),
            ),
            (names::SYSTEM_WORKING_DIR, ParamValue::String(cwd)),
        ];
        for (name, value) in system {
            self.insert(Category::System, name, value);
        }
    }

    fn seed_environment(&mut self, limits: IterationLimits) {
        self.insert(
            Category::Environment,
            names::ENV_MAX_TASK_ITERATIONS,
            ParamValue::Number(f64::from(limits.max_task_iterations)),
        );
        self.insert(
            Category::Environment,
            names::ENV_MAX_SUBTASK_ITERATIONS,
            ParamValue::Number(f64::from(limits.max_subtask_iterations)),
        );
        self.insert(
            Category::Environment,
            names::ENV_SUPPRESS_LOG,
            ParamValue::Boolean(false),
        );
    }

    fn seed_task(&mut self) {
        self.insert(Category::Task, names::TASK_NAME, ParamValue::String(String::new()));
        for name in [
            names::TASK_ATTEMPT,
            names::TASK_SUCCESS_COUNT,
            names::TASK_FAILURE_COUNT,
        ] {
            self.insert(Category::Task, name, ParamValue::Number(0.0));
        }
        // Longer name first: substitution is by substring.
        for name in [names::TASK_LAST_SUCCESS_PARTIAL, names::TASK_LAST_SUCCESS] {
            self.insert(Category::Task, name, ParamValue::Boolean(false));
        }
        self.insert(
            Category::Task,
            names::TASK_CONDITION_EXPRESSION,
            ParamValue::String(String::new()),
        );
        self.insert(
            Category::Task,
            names::TASK_CONDITION_RESULT,
            ParamValue::Boolean(false),
        );
        self.insert(
            Category::Task,
            names::TASK_CONDITION_ACTION,
            ParamValue::String(String::new()),
        );
    }

    fn seed_subtask(&mut self) {
        self.insert(
            Category::SubTask,
            names::SUBTASK_NAME,
            ParamValue::String(String::new()),
        );
        for name in [
            names::SUBTASK_EXECUTED_COUNT,
            names::SUBTASK_SUCCESS_COUNT,
            names::SUBTASK_FAILURE_COUNT,
            names::SUBTASK_SKIPPED_COUNT,
        ] {
            self.insert(Category::SubTask, name, ParamValue::Number(0.0));
        }
        for name in [
            names::SUBTASK_LAST_SUCCESS,
            names::SUBTASK_ANY_SUCCESS,
            names::SUBTASK_ANY_FAILURE,
        ] {
            self.insert(Category::SubTask, name, ParamValue::Boolean(false));
        }
        self.insert(
            Category::SubTask,
            names::SUBTASK_LAST_STATUS,
            ParamValue::String(String::new()),
        );
        self.insert(
            Category::SubTask,
            names::SUBTASK_CONDITION_EXPRESSION,
            ParamValue::String(String::new()),
        );
        self.insert(
            Category::SubTask,
            names::SUBTASK_CONDITION_RESULT,
            ParamValue::Boolean(false),
        );
        self.insert(
            Category::SubTask,
            names::SUBTASK_CONDITION_ACTION,
            ParamValue::String(String::new()),
        );
    }
}

fn bump_and_check(counters: &mut HashMap<String, u32>, id: &str, ceiling: u32) -> bool {
    let Some(count) = counters.get_mut(id) else {
        warn!(id, "iteration check for unregistered id");
        return false;
    };
    *count = count.saturating_add(1);
    if *count >= ceiling {
        warn!(id, count = *count, ceiling, "iteration ceiling reached");
        return false;
    }
    true
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn env_first(keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| std::env::var(key).ok())
        .unwrap_or_default()
}

pub(crate) fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
