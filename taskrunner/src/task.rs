//! Task and Sub-Task object graph.
//!
//! A [`Task`] is identified by the fingerprint of the document it was read
//! from. Sub-Task identities are `<fingerprint>:<sequence>` with a 1-based
//! sequence, so they never collide within one Task and stay stable when the
//! same document is loaded again.

use chrono::NaiveDateTime;

use crate::actions::SubTaskKind;
use crate::core::condition::Condition;
use crate::core::types::{ExecutionCode, Outcome};
use crate::io::document::{self, DocumentError};

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    fingerprint: String,
    pub enabled: bool,
    /// Free-form `type` attribute of the root element.
    pub kind: String,
    pub name: String,
    pub description: String,
    pub condition: Option<Condition>,
    subtasks: Vec<SubTask>,
    /// Sub-Tasks executed in the most recent attempt.
    pub executed: u32,
    /// Sub-Task failures in the most recent attempt.
    pub errors: u32,
    /// Entries accumulated by the most recent run.
    pub entries: Vec<LogEntry>,
}

impl Task {
    pub fn builder(name: impl Into<String>) -> TaskBuilder {
        TaskBuilder {
            enabled: true,
            kind: String::new(),
            name: name.into(),
            description: String::new(),
            condition: None,
            subtasks: Vec::new(),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn subtasks(&self) -> &[SubTask] {
        &self.subtasks
    }

    fn assign_fingerprint(&mut self, fingerprint: String) {
        for subtask in &mut self.subtasks {
            subtask.id = format!("{fingerprint}:{}", subtask.seq);
        }
        self.fingerprint = fingerprint;
    }
}

/// Assembles a [`Task`] in code.
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    enabled: bool,
    kind: String,
    name: String,
    description: String,
    condition: Option<Condition>,
    subtasks: Vec<SubTask>,
}

impl TaskBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn subtask(mut self, subtask: SubTask) -> Self {
        self.subtasks.push(subtask);
        self
    }

    /// Finish the Task, fingerprinting its serialised document.
    pub fn build(self) -> Result<Task, DocumentError> {
        let mut task = self.finish(String::new());
        let xml = document::render_task(&task)?;
        task.assign_fingerprint(document::fingerprint(xml.as_bytes()));
        Ok(task)
    }

    /// Number the Sub-Tasks and attach an already known fingerprint.
    pub(crate) fn finish(self, fingerprint: String) -> Task {
        let subtasks = self
            .subtasks
            .into_iter()
            .enumerate()
            .map(|(index, subtask)| SubTask {
                seq: index + 1,
                ..subtask
            })
            .collect();
        let mut task = Task {
            fingerprint: String::new(),
            enabled: self.enabled,
            kind: self.kind,
            name: self.name,
            description: self.description,
            condition: self.condition,
            subtasks,
            executed: 0,
            errors: 0,
            entries: Vec::new(),
        };
        task.assign_fingerprint(fingerprint);
        task
    }
}

/// One action step inside a [`Task`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubTask {
    seq: usize,
    id: String,
    pub enabled: bool,
    /// Main value and arguments name user parameters instead of literals.
    pub use_param: bool,
    pub name: String,
    pub description: String,
    pub main_value: String,
    pub arguments: Vec<String>,
    pub condition: Option<Condition>,
    pub kind: SubTaskKind,
}

impl SubTask {
    pub fn new(name: impl Into<String>, kind: SubTaskKind, main_value: impl Into<String>) -> Self {
        Self {
            seq: 0,
            id: String::new(),
            enabled: true,
            use_param: false,
            name: name.into(),
            description: String::new(),
            main_value: main_value.into(),
            arguments: Vec::new(),
            condition: None,
            kind,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn indirect(mut self) -> Self {
        self.use_param = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// 1-based position within the owning Task.
    pub fn seq(&self) -> usize {
        self.seq
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn type_code(&self) -> u8 {
        self.kind.type_code()
    }
}

/// One Sub-Task execution as recorded for the log sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub task_name: String,
    pub subtask_name: String,
    pub outcome: Outcome,
    pub code: ExecutionCode,
    pub status: &'static str,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Wait, WriteLog};

    fn sample() -> Task {
        Task::builder("nightly")
            .subtask(SubTask::new("note", SubTaskKind::WriteLog(WriteLog::default()), "hi"))
            .subtask(SubTask::new("pause", SubTaskKind::Wait(Wait), "5"))
            .build()
            .expect("build")
    }

    #[test]
    fn subtasks_are_numbered_from_one() {
        let task = sample();
        let seqs: Vec<_> = task.subtasks().iter().map(SubTask::seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(
            task.subtasks()[1].id(),
            format!("{}:2", task.fingerprint())
        );
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let first = sample();
        let second = sample();
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_eq!(first.fingerprint().len(), 64);

        let other = Task::builder("weekly").build().expect("build");
        assert_ne!(first.fingerprint(), other.fingerprint());
    }
}
