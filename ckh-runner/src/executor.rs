use crate::process::{activated_env, resolve_program};
use crate::tee::{test_log_name, LogTee};
use chrono::Utc;
use ckh_core::{
    CkhError, Config, HarvesterCall, Invocation, InvocationRecord, InvocationStatus, Result,
};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::{info, warn};
use uuid::Uuid;

/// Spawns harvester and server commands in the activated environment
#[derive(Debug, Clone)]
pub struct HarvestRunner {
    config: Config,
    work_dir: Option<PathBuf>,
}

impl HarvestRunner {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            work_dir: None,
        }
    }

    pub fn with_work_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.work_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Harvester invocation for `call`: the plugin flag and `harvester`
    /// subcommand, the forwarded arguments, then the fixed `--config` flag.
    pub fn invocation(&self, call: &HarvesterCall) -> Invocation {
        let mut args = vec![
            format!("--plugin={}", self.config.plugin),
            "harvester".to_string(),
        ];
        args.extend(call.args.iter().cloned());
        args.push("--config".to_string());
        args.push(self.config.ckan_ini.display().to_string());

        Invocation {
            program: self.config.paster_bin.clone(),
            args,
            env: activated_env(&self.config.venv_dir),
            working_directory: self.work_dir.clone(),
        }
    }

    /// Dev-server invocation (`paster serve <ini>`)
    pub fn serve_invocation(&self) -> Invocation {
        Invocation {
            program: self.config.paster_bin.clone(),
            args: vec![
                "serve".to_string(),
                self.config.ckan_ini.display().to_string(),
            ],
            env: activated_env(&self.config.venv_dir),
            working_directory: self.work_dir.clone(),
        }
    }

    /// Forward `call` to the harvester with inherited stdio and wait.
    pub async fn execute(&self, call: &HarvesterCall) -> Result<InvocationRecord> {
        self.run_inherited(self.invocation(call)).await
    }

    /// Launch the development server and wait until it exits.
    pub async fn serve(&self) -> Result<InvocationRecord> {
        self.run_inherited(self.serve_invocation()).await
    }

    /// Run `run_test <name>`, duplicating the child's output to the
    /// terminal and to `<name>_test.log` in the working directory.
    pub async fn execute_test(&self, name: &str) -> Result<InvocationRecord> {
        let log_path = match &self.work_dir {
            Some(dir) => dir.join(test_log_name(name)),
            None => PathBuf::from(test_log_name(name)),
        };
        let tee = LogTee::create(log_path);
        self.run_streamed(self.invocation(&HarvesterCall::run_test(name)), tee)
            .await
    }

    async fn run_inherited(&self, invocation: Invocation) -> Result<InvocationRecord> {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let start_instant = std::time::Instant::now();
        let command_line = invocation.command_line();
        let program = resolve_program(&invocation)?;

        info!(invocation_id = %id, command = %command_line, "Spawning harvester command");

        let mut command = Command::new(&program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(key, value)| (key, value)));
        if let Some(dir) = &invocation.working_directory {
            command.current_dir(dir);
        }

        let status = command.status().await.map_err(|source| CkhError::Spawn {
            command: command_line.clone(),
            source,
        })?;

        Ok(finish_record(
            id,
            command_line,
            status,
            started_at,
            start_instant,
            None,
            false,
        ))
    }

    async fn run_streamed(
        &self,
        invocation: Invocation,
        tee: LogTee,
    ) -> Result<InvocationRecord> {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let start_instant = std::time::Instant::now();
        let command_line = invocation.command_line();
        let program = resolve_program(&invocation)?;
        let log_path = tee.path().to_path_buf();

        info!(
            invocation_id = %id,
            command = %command_line,
            log = %log_path.display(),
            "Spawning harvester test command"
        );

        let mut command = Command::new(&program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(key, value)| (key, value)))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.working_directory {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| CkhError::Spawn {
            command: command_line.clone(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let tee = Arc::new(Mutex::new(tee));

        let (out_result, err_result, status) = tokio::join!(
            pump(stdout, tokio::io::stdout(), Arc::clone(&tee)),
            pump(stderr, tokio::io::stderr(), Arc::clone(&tee)),
            child.wait(),
        );
        let status = status.map_err(CkhError::IoError)?;

        if let Err(e) = out_result {
            warn!(invocation_id = %id, error = %e, "Lost part of the child's stdout");
        }
        if let Err(e) = err_result {
            warn!(invocation_id = %id, error = %e, "Lost part of the child's stderr");
        }

        let log_degraded = tee.lock().map(|t| t.degraded()).unwrap_or(true);

        Ok(finish_record(
            id,
            command_line,
            status,
            started_at,
            start_instant,
            Some(log_path),
            log_degraded,
        ))
    }
}

/// Copy all bytes from the child's pipe to the parent stream and the tee.
async fn pump<R, W>(
    reader: Option<R>,
    mut out: W,
    tee: Arc<Mutex<LogTee>>,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = match reader {
        Some(reader) => reader,
        None => return Ok(()),
    };

    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n]).await?;
        out.flush().await?;
        if let Ok(mut tee) = tee.lock() {
            tee.write(&buf[..n]);
        }
    }
    Ok(())
}

fn finish_record(
    id: Uuid,
    command: String,
    status: std::process::ExitStatus,
    started_at: chrono::DateTime<Utc>,
    start_instant: std::time::Instant,
    log_path: Option<PathBuf>,
    log_degraded: bool,
) -> InvocationRecord {
    let duration_ms = start_instant.elapsed().as_millis() as u64;
    let exit_code = status.code();
    let outcome = if status.success() {
        InvocationStatus::Success
    } else {
        InvocationStatus::Failed
    };

    info!(
        invocation_id = %id,
        status = ?outcome,
        exit_code = ?exit_code,
        duration_ms,
        "Invocation completed"
    );

    InvocationRecord {
        id,
        command,
        status: outcome,
        exit_code,
        duration_ms,
        started_at,
        completed_at: Some(Utc::now()),
        log_path,
        log_degraded,
    }
}
