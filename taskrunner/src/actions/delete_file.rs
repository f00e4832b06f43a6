//! `deleteFile`: remove a single file.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::LazyLock;

use tracing::{debug, instrument};

use crate::actions::{ActionContext, ActionInput, SubTaskAction};
use crate::core::status::{ActionReport, StatusTable};

pub const TYPE_CODE: u8 = 0x01;
pub const TYPE_NAME: &str = "deleteFile";

static STATUS: LazyLock<StatusTable> = LazyLock::new(|| {
    StatusTable::builder()
        .success("deleted", "file removed")
        .failure("not_found", "file does not exist")
        .failure("permission_denied", "file could not be removed")
        .failure("not_a_file", "path is a directory")
        .failure("missing_path", "no path was given")
        .skipped("already_absent", "file was already absent")
        .build()
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteFile {
    /// Treat a missing file as skipped rather than failed.
    pub ignore_missing: bool,
}

impl SubTaskAction for DeleteFile {
    fn type_code(&self) -> u8 {
        TYPE_CODE
    }

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn status_table(&self) -> &'static StatusTable {
        &STATUS
    }

    #[instrument(skip_all, fields(path = input.main_value))]
    fn run(&self, input: &ActionInput<'_>, _ctx: &mut dyn ActionContext) -> ActionReport {
        let table = self.status_table();
        if input.main_value.trim().is_empty() {
            return table.set_status("missing_path", "no file path given");
        }
        let path = Path::new(input.main_value);
        if path.is_dir() {
            return table.set_status("not_a_file", format!("{} is a directory", path.display()));
        }
        match fs::remove_file(path) {
            Ok(()) => {
                debug!("file removed");
                table.set_status("deleted", format!("removed {}", path.display()))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                if self.ignore_missing {
                    table.set_status("already_absent", format!("{} not present", path.display()))
                } else {
                    table.set_status("not_found", format!("{} not found", path.display()))
                }
            }
            Err(err) if err.kind() == ErrorKind::PermissionDenied => table.set_status(
                "permission_denied",
                format!("remove {}: {err}", path.display()),
            ),
            Err(err) => table.set_status(
                crate::core::status::ERROR,
                format!("remove {}: {err}", path.display()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Outcome;
    use crate::test_support::context;

    fn run(kind: &DeleteFile, path: &Path) -> ActionReport {
        let value = path.to_string_lossy().into_owned();
        let input = ActionInput {
            name: "delete",
            main_value: &value,
            arguments: &[],
        };
        kind.run(&input, &mut context())
    }

    #[test]
    fn removes_existing_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("work.lock");
        fs::write(&path, "x").expect("write");

        let report = run(&DeleteFile::default(), &path);
        assert_eq!(report.outcome, Outcome::Success);
        assert_eq!(report.status.id, "deleted");
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_fails_unless_ignored() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("absent");

        let strict = run(&DeleteFile::default(), &path);
        assert_eq!(strict.outcome, Outcome::Failure);
        assert_eq!(strict.status.id, "not_found");

        let lenient = run(&DeleteFile { ignore_missing: true }, &path);
        assert_eq!(lenient.outcome, Outcome::Skipped);
        assert_eq!(lenient.status.id, "already_absent");
    }

    #[test]
    fn directories_are_refused() {
        let temp = tempfile::tempdir().expect("tempdir");
        let report = run(&DeleteFile::default(), temp.path());
        assert_eq!(report.status.id, "not_a_file");
        assert!(temp.path().exists());
    }
}
