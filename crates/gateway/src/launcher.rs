//! Lifecycle of the external interpreter process.
//!
//! [`ProcessLauncher`] spawns the configured command on demand, notices
//! when the child has exited and starts a new one on the next call. The
//! child is spawned with `kill_on_drop`, so dropping the launcher never
//! leaks a process.

use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::error::GatewayError;

pub struct ProcessLauncher {
    program: String,
    args: Vec<String>,
    python_path: Option<String>,
    startup_delay: Duration,
    child: Mutex<Option<Child>>,
}

impl ProcessLauncher {
    /// Launcher for `command` (program followed by arguments).
    ///
    /// Returns `None` for an empty command line.
    pub fn new(command: &[String], python_path: Option<String>, startup_delay: Duration) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            python_path,
            startup_delay,
            child: Mutex::new(None),
        })
    }

    /// Make sure the process is alive, spawning it if needed.
    ///
    /// Returns `true` when a new process was started.
    pub async fn ensure_running(&self) -> Result<bool, GatewayError> {
        let mut guard = self.child.lock().await;

        if let Some(child) = guard.as_mut() {
            match child.try_wait() {
                Ok(None) => return Ok(false),
                Ok(Some(status)) => {
                    tracing::warn!(program = %self.program, %status, "Gateway process exited");
                }
                Err(e) => {
                    tracing::warn!(program = %self.program, error = %e, "Cannot poll gateway process");
                }
            }
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).kill_on_drop(true);
        if let Some(path) = &self.python_path {
            cmd.env("PYTHONPATH", path);
        }

        let child = cmd
            .spawn()
            .map_err(|e| GatewayError::Launch(format!("{}: {e}", self.program)))?;

        tracing::info!(program = %self.program, pid = child.id(), "Started gateway process");
        *guard = Some(child);

        // Give the process time to open its listening socket.
        tokio::time::sleep(self.startup_delay).await;
        Ok(true)
    }

    /// True while a spawned process has not exited.
    pub async fn is_running(&self) -> bool {
        match self.child.lock().await.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Kill the process if one is running and reap it.
    pub async fn shutdown(&self) {
        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };
        if let Err(e) = child.kill().await {
            tracing::warn!(program = %self.program, error = %e, "Failed to kill gateway process");
        } else {
            tracing::info!(program = %self.program, "Stopped gateway process");
        }
    }
}
