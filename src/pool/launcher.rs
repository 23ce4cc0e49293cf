use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use crate::app::{Result, SummaristError};
use crate::worker::WORKER_INDEX_ENV;

/// Starts worker processes for the pool
pub trait WorkerLauncher: Send + Sync {
    /// Spawn the worker for slot `index` with piped stdin and stdout
    fn launch(&self, index: usize) -> Result<Child>;
}

/// Launches workers by running a command
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandLauncher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Re-run the current executable as `<exe> [--config <path>] worker`
    pub fn current_exe(config_path: Option<&Path>) -> Result<Self> {
        let exe = std::env::current_exe()?;
        let mut args = Vec::new();
        if let Some(path) = config_path {
            args.push("--config".to_string());
            args.push(path.display().to_string());
        }
        args.push("worker".to_string());
        Ok(Self::new(exe, args))
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl WorkerLauncher for CommandLauncher {
    fn launch(&self, index: usize) -> Result<Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env(WORKER_INDEX_ENV, index.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            // Frames go over stdout; logs share the parent's stderr
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            SummaristError::Worker(format!(
                "Failed to launch {}: {}",
                self.program.display(),
                e
            ))
        })?;
        debug!(index, pid = ?child.id(), program = %self.program.display(), "Worker launched");
        Ok(child)
    }
}
