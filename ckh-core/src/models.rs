use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;
use uuid::Uuid;

/// A harvester subcommand plus its arguments, forwarded verbatim
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarvesterCall {
    pub args: Vec<String>,
}

impl HarvesterCall {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Shortcut for the gather consumer
    pub fn gather_consumer() -> Self {
        Self::new(["gather_consumer"])
    }

    /// Shortcut for the fetch consumer
    pub fn fetch_consumer() -> Self {
        Self::new(["fetch_consumer"])
    }

    /// `run_test <name>` for a single harvest source
    pub fn run_test(name: &str) -> Self {
        Self::new(["run_test", name])
    }

    pub fn append<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// A fully resolved external command, ready to spawn
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, OsString)>,
    pub working_directory: Option<PathBuf>,
}

impl Invocation {
    /// Render the command line for logs and records
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Outcome of a spawned invocation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InvocationStatus {
    Success,
    Failed,
}

/// Record of one external process invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRecord {
    pub id: Uuid,
    pub command: String,
    pub status: InvocationStatus,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Log file a test run teed its output into, if any
    pub log_path: Option<PathBuf>,
    /// True when the log file could not be created or written
    pub log_degraded: bool,
}

impl InvocationRecord {
    /// Exit code to report to the calling shell
    pub fn shell_exit_code(&self) -> i32 {
        match self.status {
            InvocationStatus::Success => 0,
            InvocationStatus::Failed => self.exit_code.unwrap_or(1),
        }
    }
}
