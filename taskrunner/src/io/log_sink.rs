//! Append-only, tab-delimited execution log.
//!
//! # Separation of Concerns
//!
//! - **Execution log (this module)**: product artifact, one line per executed
//!   Sub-Task. Written when logging is enabled, unaffected by `RUST_LOG`.
//! - **Tracing (`logging`)**: developer diagnostics on stderr.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::task::LogEntry;

pub const HEADER: &str =
    "# taskrunner execution log\ntimestamp\toutcome\tcode\ttask\tsubtask\n";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Render one entry without the trailing newline.
pub fn format_entry(entry: &LogEntry) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}",
        entry.timestamp.format(TIMESTAMP_FORMAT),
        entry.outcome,
        entry.code,
        clean(&entry.task_name),
        clean(&entry.subtask_name),
    )
}

/// Append `entries` to `path`, writing the header first if the file is new.
#[instrument(skip_all, fields(path = %path.display(), entries = entries.len()))]
pub fn append_entries(path: &Path, entries: &[LogEntry]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let fresh = !path.exists();
    let mut buf = String::new();
    if fresh {
        buf.push_str(HEADER);
    }
    for entry in entries {
        buf.push_str(&format_entry(entry));
        buf.push('\n');
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log {}", path.display()))?;
    file.write_all(buf.as_bytes())
        .with_context(|| format!("append log {}", path.display()))?;
    debug!(fresh, "log entries flushed");
    Ok(())
}

/// Names are free text; keep them on one line and in one column.
fn clean(name: &str) -> String {
    name.replace(['\t', '\r', '\n'], " ")
}
