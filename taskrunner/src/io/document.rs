//! XML config documents: one root `<task>` with an ordered `<subTasks>` list.
//!
//! The Sub-Task `type` attribute selects the concrete kind. Kind-specific
//! attributes (`ignoreMissing`, `wait`, `timeoutSecs`, `level`) sit next to
//! the common ones and are ignored on kinds that do not use them.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::actions::{
    DeleteFile, LoadTask, LogLevel, RunProgram, SubTaskKind, Wait, WriteLog, delete_file,
    load_task as load_task_kind, run_program, wait, write_log,
};
use crate::core::condition::Condition;
use crate::io::config::write_atomic;
use crate::task::{SubTask, Task};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("parse task document")]
    Parse(#[from] quick_xml::DeError),
    #[error("serialise task document")]
    Serialize(#[from] quick_xml::SeError),
    #[error("sub-task {index} has unknown type `{kind}`")]
    UnknownKind { index: usize, kind: String },
    #[error("sub-task {index} has invalid {attribute} `{value}`")]
    InvalidAttribute {
        index: usize,
        attribute: &'static str,
        value: String,
    },
}

/// Lowercase hex SHA-256 of the exact document bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Parse a document. The Task is fingerprinted over `bytes`.
pub fn parse_task(bytes: &[u8]) -> Result<Task, DocumentError> {
    let text = std::str::from_utf8(bytes)?;
    let doc: TaskDocument = quick_xml::de::from_str(text)?;
    let mut builder = Task::builder(doc.name)
        .enabled(doc.enabled)
        .kind(doc.kind)
        .description(doc.description);
    if let Some(condition) = doc.condition {
        builder = builder.condition(condition);
    }
    for (index, item) in doc.sub_tasks.items.into_iter().enumerate() {
        builder = builder.subtask(subtask_from_document(index + 1, item)?);
    }
    Ok(builder.finish(fingerprint(bytes)))
}

/// Serialise a Task. Empty argument lists and unset attributes are omitted.
pub fn render_task(task: &Task) -> Result<String, DocumentError> {
    let doc = TaskDocument {
        enabled: task.enabled,
        kind: task.kind.clone(),
        name: task.name.clone(),
        description: task.description.clone(),
        condition: task.condition.clone(),
        sub_tasks: SubTaskList {
            items: task.subtasks().iter().map(subtask_to_document).collect(),
        },
    };
    Ok(quick_xml::se::to_string(&doc)?)
}

#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_task(path: &Path) -> Result<Task> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let task = parse_task(&bytes).with_context(|| format!("parse {}", path.display()))?;
    debug!(fingerprint = task.fingerprint(), subtasks = task.subtasks().len(), "task loaded");
    Ok(task)
}

/// Atomically write `task` as a document (temp file + rename).
pub fn save_task(path: &Path, task: &Task) -> Result<()> {
    let mut xml = render_task(task).context("serialise task document")?;
    xml.push('\n');
    write_atomic(path, &xml)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "task")]
struct TaskDocument {
    #[serde(rename = "@enabled", default = "enabled_by_default")]
    enabled: bool,
    #[serde(rename = "@type", default)]
    kind: String,
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition: Option<Condition>,
    #[serde(rename = "subTasks", default)]
    sub_tasks: SubTaskList,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SubTaskList {
    #[serde(rename = "subTask", default)]
    items: Vec<SubTaskDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SubTaskDocument {
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "@enabled", default = "enabled_by_default")]
    enabled: bool,
    #[serde(rename = "@useParam", default)]
    use_param: bool,
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@ignoreMissing", default, skip_serializing_if = "Option::is_none")]
    ignore_missing: Option<bool>,
    #[serde(rename = "@wait", default, skip_serializing_if = "Option::is_none")]
    wait: Option<bool>,
    #[serde(rename = "@timeoutSecs", default, skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
    #[serde(rename = "@level", default, skip_serializing_if = "Option::is_none")]
    level: Option<String>,
    #[serde(rename = "mainValue", default)]
    main_value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(default, skip_serializing_if = "Arguments::is_empty")]
    arguments: Arguments,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition: Option<Condition>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Arguments {
    #[serde(rename = "argument", default)]
    items: Vec<String>,
}

impl Arguments {
    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn enabled_by_default() -> bool {
    true
}

fn subtask_from_document(index: usize, doc: SubTaskDocument) -> Result<SubTask, DocumentError> {
    let kind = match doc.kind.as_str() {
        delete_file::TYPE_NAME => SubTaskKind::DeleteFile(DeleteFile {
            ignore_missing: doc.ignore_missing.unwrap_or(false),
        }),
        run_program::TYPE_NAME => {
            let defaults = RunProgram::default();
            SubTaskKind::RunProgram(RunProgram {
                wait: doc.wait.unwrap_or(defaults.wait),
                timeout_secs: doc.timeout_secs.unwrap_or(defaults.timeout_secs),
            })
        }
        write_log::TYPE_NAME => {
            let level = match doc.level.as_deref() {
                None => LogLevel::default(),
                Some(raw) => raw
                    .parse()
                    .map_err(|_| DocumentError::InvalidAttribute {
                        index,
                        attribute: "level",
                        value: raw.to_string(),
                    })?,
            };
            SubTaskKind::WriteLog(WriteLog { level })
        }
        wait::TYPE_NAME => SubTaskKind::Wait(Wait),
        load_task_kind::TYPE_NAME => SubTaskKind::LoadTask(LoadTask),
        other => {
            return Err(DocumentError::UnknownKind {
                index,
                kind: other.to_string(),
            });
        }
    };
    let mut subtask = SubTask::new(doc.name, kind, doc.main_value)
        .with_description(doc.description)
        .with_arguments(doc.arguments.items);
    subtask.enabled = doc.enabled;
    subtask.use_param = doc.use_param;
    subtask.condition = doc.condition;
    Ok(subtask)
}

fn subtask_to_document(subtask: &SubTask) -> SubTaskDocument {
    let mut doc = SubTaskDocument {
        kind: subtask.kind.type_name().to_string(),
        enabled: subtask.enabled,
        use_param: subtask.use_param,
        name: subtask.name.clone(),
        ignore_missing: None,
        wait: None,
        timeout_secs: None,
        level: None,
        main_value: subtask.main_value.clone(),
        description: subtask.description.clone(),
        arguments: Arguments {
            items: subtask.arguments.clone(),
        },
        condition: subtask.condition.clone(),
    };
    match &subtask.kind {
        SubTaskKind::DeleteFile(kind) => {
            doc.ignore_missing = kind.ignore_missing.then_some(true);
        }
        SubTaskKind::RunProgram(kind) => {
            doc.wait = Some(kind.wait);
            doc.timeout_secs = Some(kind.timeout_secs);
        }
        SubTaskKind::WriteLog(kind) => {
            doc.level = Some(kind.level.as_str().to_string());
        }
        SubTaskKind::Wait(_) | SubTaskKind::LoadTask(_) => {}
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Action, Phase};

    const SAMPLE: &str = r#"<task enabled="true" type="maintenance" name="Nightly cleanup">
  <description>Remove stale files</description>
  <condition type="pre" action="run" default="exit" expression="ENV_MAX_TASK_ITERATIONS &gt; 1"/>
  <subTasks>
    <subTask type="deleteFile" enabled="true" useParam="false" name="remove lock" ignoreMissing="true">
      <mainValue>/tmp/work.lock</mainValue>
      <description>stale lock</description>
      <condition type="post" action="run" default="skip" expression="SUBTASK_LAST_SUCCESS"/>
    </subTask>
    <subTask type="runProgram" enabled="false" name="rotate" wait="true" timeoutSecs="30">
      <mainValue>logrotate</mainValue>
      <arguments>
        <argument>-f</argument>
        <argument>/etc/logrotate.conf</argument>
      </arguments>
    </subTask>
    <subTask type="writeLog" name="note" level="warn">
      <mainValue>done</mainValue>
    </subTask>
  </subTasks>
</task>"#;

    #[test]
    fn parses_the_common_shape() {
        let task = parse_task(SAMPLE.as_bytes()).expect("parse");
        assert_eq!(task.name, "Nightly cleanup");
        assert_eq!(task.kind, "maintenance");
        assert!(task.enabled);
        let condition = task.condition.as_ref().expect("task condition");
        assert_eq!(condition.check_type(), Phase::Pre);
        assert_eq!(condition.expression, "ENV_MAX_TASK_ITERATIONS > 1");
        assert_eq!(condition.check_operation(false), Action::Exit);

        let subtasks = task.subtasks();
        assert_eq!(subtasks.len(), 3);
        assert_eq!(
            subtasks[0].kind,
            SubTaskKind::DeleteFile(DeleteFile {
                ignore_missing: true
            })
        );
        assert_eq!(subtasks[0].main_value, "/tmp/work.lock");
        assert!(subtasks[0].condition.is_some());
        assert!(!subtasks[1].enabled);
        assert_eq!(subtasks[1].arguments, vec!["-f", "/etc/logrotate.conf"]);
        assert_eq!(
            subtasks[1].kind,
            SubTaskKind::RunProgram(RunProgram {
                wait: true,
                timeout_secs: 30
            })
        );
        assert!(subtasks[2].enabled);
        assert_eq!(
            subtasks[2].kind,
            SubTaskKind::WriteLog(WriteLog {
                level: LogLevel::Warn
            })
        );
    }

    #[test]
    fn fingerprint_follows_document_bytes() {
        let first = parse_task(SAMPLE.as_bytes()).expect("parse");
        let again = parse_task(SAMPLE.as_bytes()).expect("parse");
        assert_eq!(first.fingerprint(), again.fingerprint());
        assert_eq!(first.fingerprint(), fingerprint(SAMPLE.as_bytes()));

        let edited = SAMPLE.replace("Nightly", "Weekly");
        let other = parse_task(edited.as_bytes()).expect("parse");
        assert_ne!(first.fingerprint(), other.fingerprint());
    }

    fn assert_same_semantics(left: &Task, right: &Task) {
        assert_eq!(left.enabled, right.enabled);
        assert_eq!(left.kind, right.kind);
        assert_eq!(left.name, right.name);
        assert_eq!(left.description, right.description);
        assert_eq!(left.condition, right.condition);
        assert_eq!(left.subtasks().len(), right.subtasks().len());
        for (l, r) in left.subtasks().iter().zip(right.subtasks()) {
            assert_eq!(l.seq(), r.seq());
            assert_eq!(l.kind, r.kind);
            assert_eq!(l.enabled, r.enabled);
            assert_eq!(l.use_param, r.use_param);
            assert_eq!(l.name, r.name);
            assert_eq!(l.description, r.description);
            assert_eq!(l.main_value, r.main_value);
            assert_eq!(l.arguments, r.arguments);
            assert_eq!(l.condition, r.condition);
        }
    }

    #[test]
    fn render_then_parse_preserves_semantics() {
        let task = parse_task(SAMPLE.as_bytes()).expect("parse");
        let rendered = render_task(&task).expect("render");
        let reparsed = parse_task(rendered.as_bytes()).expect("reparse");

        assert_same_semantics(&task, &reparsed);
        assert_eq!(render_task(&reparsed).expect("render"), rendered);
    }

    #[test]
    fn non_default_flags_survive_a_round_trip() {
        let task = Task::builder("flags")
            .enabled(false)
            .kind("audit")
            .description("every flag set")
            .subtask(
                SubTask::new("pause", SubTaskKind::Wait(Wait), "Delay")
                    .indirect()
                    .disabled()
                    .with_description("waits for Delay ms")
                    .with_arguments(["Extra"]),
            )
            .subtask(SubTask::new(
                "clean",
                SubTaskKind::DeleteFile(DeleteFile {
                    ignore_missing: true,
                }),
                "/tmp/x",
            ))
            .build()
            .expect("build");

        let reparsed =
            parse_task(render_task(&task).expect("render").as_bytes()).expect("reparse");

        assert!(!reparsed.enabled);
        assert!(reparsed.subtasks()[0].use_param);
        assert_same_semantics(&task, &reparsed);
    }

    #[test]
    fn empty_arguments_are_omitted() {
        let task = parse_task(SAMPLE.as_bytes()).expect("parse");
        let rendered = render_task(&task).expect("render");
        assert_eq!(rendered.matches("<arguments>").count(), 1);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let xml = r#"<task name="t"><subTasks><subTask type="formatDisk"><mainValue>c</mainValue></subTask></subTasks></task>"#;
        let err = parse_task(xml.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::UnknownKind { index: 1, ref kind } if kind == "formatDisk"
        ));
    }

    #[test]
    fn invalid_level_is_rejected() {
        let xml = r#"<task name="t"><subTasks><subTask type="writeLog" level="loud"><mainValue>x</mainValue></subTask></subTasks></task>"#;
        let err = parse_task(xml.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::InvalidAttribute {
                attribute: "level",
                ..
            }
        ));
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("task.xml");
        let task = parse_task(SAMPLE.as_bytes()).expect("parse");
        save_task(&path, &task).expect("save");

        let loaded = load_task(&path).expect("load");
        assert_eq!(loaded.subtasks().len(), 3);
        assert_eq!(
            loaded.fingerprint(),
            fingerprint(&fs::read(&path).expect("read"))
        );
    }
}
