//! Child-process execution for the `runProgram` Sub-Task kind.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Captured output of a finished (or killed) child.
#[derive(Debug)]
pub struct ProgramOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl ProgramOutput {
    /// Last non-empty stderr line, for failure messages.
    pub fn stderr_tail(&self) -> Option<String> {
        String::from_utf8_lossy(&self.stderr)
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }
}

/// Run `cmd` to completion, killing it once `timeout` elapses.
///
/// stdout and stderr are drained on reader threads so a chatty child cannot
/// block on a full pipe; at most `output_limit` bytes of each are kept.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit))]
pub fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit: usize,
) -> Result<ProgramOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().context("spawn program")?;
    debug!(pid = child.id(), "program started");

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_reader = thread::spawn(move || drain_limited(stdout, output_limit));
    let stderr_reader = thread::spawn(move || drain_limited(stderr, output_limit));

    let (status, timed_out) = wait_or_kill(&mut child, timeout)?;

    let (stdout, stdout_truncated) = join_reader(stdout_reader).context("collect stdout")?;
    let (stderr, stderr_truncated) = join_reader(stderr_reader).context("collect stderr")?;
    if stdout_truncated > 0 || stderr_truncated > 0 {
        debug!(stdout_truncated, stderr_truncated, "program output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "program finished");
    Ok(ProgramOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// Start `cmd` and return immediately with its process id.
#[instrument(skip_all)]
pub fn spawn_detached(mut cmd: Command) -> Result<u32> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    let child = cmd.spawn().context("spawn program")?;
    debug!(pid = child.id(), "program started without waiting");
    Ok(child.id())
}

fn wait_or_kill(child: &mut Child, timeout: Duration) -> Result<(ExitStatus, bool)> {
    if let Some(status) = child.wait_timeout(timeout).context("wait for program")? {
        return Ok((status, false));
    }
    warn!(timeout_secs = timeout.as_secs(), "program timed out, killing");
    child.kill().context("kill program")?;
    let status = child.wait().context("reap program after kill")?;
    Ok((status, true))
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
}

/// Read `reader` to EOF, keeping the first `limit` bytes and counting the rest.
fn drain_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read program output")?;
        if n == 0 {
            return Ok((kept, dropped));
        }
        let keep = n.min(limit.saturating_sub(kept.len()));
        kept.extend_from_slice(&chunk[..keep]);
        dropped += n - keep;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        cmd
    }

    #[test]
    fn captures_output_and_status() {
        let output = run_with_timeout(
            sh("echo out; echo oops >&2; exit 3"),
            Duration::from_secs(10),
            1024,
        )
        .expect("run");
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout), "out\n");
        assert_eq!(output.stderr_tail().as_deref(), Some("oops"));
        assert!(!output.timed_out);
    }

    #[test]
    fn output_beyond_limit_is_counted_not_kept() {
        let output =
            run_with_timeout(sh("printf 0123456789"), Duration::from_secs(10), 4).expect("run");
        assert_eq!(output.stdout, b"0123");
        assert_eq!(output.stdout_truncated, 6);
    }

    #[test]
    fn slow_programs_are_killed() {
        let output =
            run_with_timeout(sh("exec sleep 5"), Duration::from_millis(200), 64).expect("run");
        assert!(output.timed_out);
        assert!(!output.status.success());
    }
}
