//! CLI tests for `taskrunner run` and `taskrunner validate`.
//!
//! Spawns the binary against documents in a temp dir and checks exit codes
//! and the artifacts a run leaves behind.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use taskrunner::exit_codes;
use taskrunner::io::config::{LogSettings, Settings, write_settings};
use taskrunner::test_support::{Workspace, failing, note, post, task};

const DOCUMENT: &str = r#"<task name="cli">
  <condition type="pre" action="run" default="skip" expression="Mode == 'go'"/>
  <subTasks>
    <subTask type="writeLog" name="hello">
      <mainValue>hello from the cli</mainValue>
    </subTask>
  </subTasks>
</task>"#;

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_taskrunner"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("spawn taskrunner")
}

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).expect("write document");
}

#[test]
fn run_with_parameter_succeeds() {
    let ws = Workspace::new();
    write(ws.path(), "task.xml", DOCUMENT);

    let output = run(ws.path(), &["run", "task.xml", "-p", "p:s:Mode:go"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("cli: success"), "stdout: {stdout}");
}

#[test]
fn run_without_parameter_is_skipped() {
    let ws = Workspace::new();
    write(ws.path(), "task.xml", DOCUMENT);

    let output = run(ws.path(), &["run", "task.xml"]);

    assert_eq!(output.status.code(), Some(exit_codes::SKIPPED));
}

#[test]
fn failed_subtask_exits_with_failure_and_writes_log() {
    let ws = Workspace::new();
    let doc = ws.write_task("fail.xml", &task("fails", vec![failing("gone", ws.path())]));

    let output = run(
        ws.path(),
        &["run", doc.to_str().expect("utf-8 path"), "--log", "out/run.log"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    let log = fs::read_to_string(ws.path().join("out/run.log")).expect("read log");
    assert!(log.lines().any(|line| line.ends_with("\tfails\tgone")));
}

#[test]
fn settings_file_enables_log_and_limits() {
    let ws = Workspace::new();
    let settings = Settings {
        log: LogSettings {
            enabled: true,
            path: "settings.log".into(),
        },
        ..Settings::default()
    };
    write_settings(&ws.path().join("taskrunner.toml"), &settings).expect("write settings");
    ws.write_task(
        "loop.xml",
        &task(
            "loop",
            vec![note("again").with_condition(post("true", "restart_last_subtask", "run"))],
        ),
    );

    let output = run(
        ws.path(),
        &["run", "loop.xml", "-p", "p:n:ENV_MAX_SUBTASK_ITERATIONS:2"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::SKIPPED));
    let log = fs::read_to_string(ws.path().join("settings.log")).expect("read log");
    assert_eq!(log.lines().filter(|line| line.ends_with("\tagain")).count(), 2);
}

#[test]
fn rejected_parameter_is_invalid_usage() {
    let ws = Workspace::new();
    write(ws.path(), "task.xml", DOCUMENT);

    let output = run(ws.path(), &["run", "task.xml", "-p", "p:s:TASK_NAME:hijack"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("rejected"));
}

#[test]
fn missing_document_is_invalid_usage() {
    let ws = Workspace::new();

    let output = run(ws.path(), &["run", "absent.xml"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn validate_accepts_a_clean_document() {
    let ws = Workspace::new();
    write(ws.path(), "task.xml", DOCUMENT);

    let output = run(ws.path(), &["validate", "task.xml"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&output.stdout).contains("1 sub-tasks, ok"));
}

#[test]
fn validate_reports_bad_conditions() {
    let ws = Workspace::new();
    write(
        ws.path(),
        "bad.xml",
        r#"<task name="bad">
  <subTasks>
    <subTask type="writeLog" name="first">
      <mainValue>x</mainValue>
      <condition type="pre" action="leap" default="run" expression="1 = 1"/>
    </subTask>
  </subTasks>
</task>"#,
    );

    let output = run(ws.path(), &["validate", "bad.xml"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sub-task 1 'first'"), "stderr: {stderr}");
}
