//! Runner settings stored in `taskrunner.toml`.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::store::{DEFAULT_MAX_ITERATIONS, IterationLimits};

pub const DEFAULT_SETTINGS_FILE: &str = "taskrunner.toml";
pub const DEFAULT_LOG_FILE: &str = "taskrunner.log";

/// Runner settings (TOML).
///
/// Edited by humans; every field is optional and command-line flags take
/// precedence over what is stored here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Stop at the first failed Sub-Task.
    pub halt_on_error: bool,

    /// Narrate control-flow decisions on stdout.
    pub display: bool,

    pub log: LogSettings,

    pub limits: LimitSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogSettings {
    /// Append execution records to `path` after each run.
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

/// Seeds for `ENV_MAX_TASK_ITERATIONS` / `ENV_MAX_SUBTASK_ITERATIONS`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitSettings {
    pub max_task_iterations: u32,
    pub max_subtask_iterations: u32,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_task_iterations: DEFAULT_MAX_ITERATIONS,
            max_subtask_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_task_iterations == 0 {
            return Err(anyhow!("limits.max_task_iterations must be > 0"));
        }
        if self.limits.max_subtask_iterations == 0 {
            return Err(anyhow!("limits.max_subtask_iterations must be > 0"));
        }
        if self.log.path.as_os_str().is_empty() {
            return Err(anyhow!("log.path must not be empty"));
        }
        Ok(())
    }

    pub fn iteration_limits(&self) -> IterationLimits {
        IterationLimits {
            max_task_iterations: self.limits.max_task_iterations,
            max_subtask_iterations: self.limits.max_subtask_iterations,
        }
    }
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `Settings::default()`.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: Settings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings
        .validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(settings)
}

/// Atomically write settings to disk (temp file + rename).
pub fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    settings.validate()?;
    let mut buf = toml::to_string_pretty(settings).context("serialize settings toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Write `contents` next to `path` and rename it into place.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut tmp_name = path
        .file_name()
        .map(OsString::from)
        .with_context(|| format!("path has no file name {}", path.display()))?;
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
