//! Remote command execution
//!
//! Managers never talk to a remote host directly; they are handed a
//! [`CommandExecutor`] at construction and treat it as an opaque
//! text-in/text-out channel. The production implementation spawns the
//! system `ssh` binary, which keeps this module free of protocol state
//! and lets tests substitute a scripted fake.

use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Errors raised while running a remote command
#[derive(Debug, Error)]
pub enum CommandError {
    /// The local `ssh` process could not be spawned
    #[error("failed to spawn ssh: {0}")]
    Spawn(String),

    /// The remote command exited with a non-zero status
    #[error("remote command failed ({status}): {stderr}")]
    Failed {
        /// Exit status reported by the ssh process
        status: String,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// The command output was not valid UTF-8
    #[error("remote command produced invalid UTF-8: {0}")]
    InvalidOutput(String),
}

/// Result type alias for command execution
pub type CommandResult<T> = Result<T, CommandError>;

/// Capability to run a shell command on a remote target
///
/// `run` resolves with the raw captured stdout. No retry and no overall
/// timeout are applied here; that policy belongs to callers.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Executes `command` on the remote target and returns its output
    ///
    /// # Errors
    /// Fails if the command cannot be started, exits non-zero, or
    /// produces undecodable output.
    async fn run(&self, command: &str) -> CommandResult<String>;
}

/// Runs commands on a remote host through the system `ssh` binary
#[derive(Debug, Clone)]
pub struct SshCommandExecutor {
    destination: String,
    port: Option<u16>,
    identity_file: Option<String>,
}

impl SshCommandExecutor {
    /// Creates an executor for the given destination (`host` or `user@host`)
    #[must_use]
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            port: None,
            identity_file: None,
        }
    }

    /// Sets a non-default SSH port
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the path to an SSH private key
    #[must_use]
    pub fn with_identity_file(mut self, path: impl Into<String>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Argument list passed to `ssh` for the given command
    fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            // Key-based auth only; a password prompt would hang the poll
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "ConnectTimeout=5".to_string(),
        ];

        if let Some(port) = self.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }

        if let Some(key) = &self.identity_file {
            args.push("-i".to_string());
            args.push(key.clone());
        }

        args.push(self.destination.clone());
        args.push(command.to_string());
        args
    }
}

#[async_trait]
impl CommandExecutor for SshCommandExecutor {
    async fn run(&self, command: &str) -> CommandResult<String> {
        let output = Command::new("ssh")
            .args(self.ssh_args(command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CommandError::Spawn(e.to_string()))?;

        if output.status.success() {
            String::from_utf8(output.stdout)
                .map_err(|e| CommandError::InvalidOutput(e.to_string()))
        } else {
            Err(CommandError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
