use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Log filename for a harvest test run
pub fn test_log_name(name: &str) -> String {
    format!("{name}_test.log")
}

/// Best-effort duplicate of a test run's output into a log file.
///
/// The log must never get in the way of the run itself: creation and write
/// failures are reported once as a warning and the tee keeps accepting
/// bytes as a no-op.
#[derive(Debug)]
pub struct LogTee {
    path: PathBuf,
    file: Option<File>,
    degraded: bool,
}

impl LogTee {
    pub fn create(path: PathBuf) -> Self {
        match File::create(&path) {
            Ok(file) => Self {
                path,
                file: Some(file),
                degraded: false,
            },
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not create test log, output goes to the terminal only"
                );
                Self {
                    path,
                    file: None,
                    degraded: true,
                }
            }
        }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.write_all(bytes) {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Test log write failed, output goes to the terminal only"
                );
                self.file = None;
                self.degraded = true;
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn degraded(&self) -> bool {
        self.degraded
    }
}
