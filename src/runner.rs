//! Local process boundary — the few cluster tools invoked on this host.
//!
//! Operations never reach for `tokio::process` directly; they go through
//! [`CommandRunner`] so tests can script tool output without touching the
//! system.

use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// The process could not be run at all. A process that ran and exited
/// non-zero is a [`CommandOutput`], not an error.
#[derive(Debug, Error)]
#[error("failed to run '{argv0}': {source}")]
pub struct RunnerError {
    pub argv0: String,
    #[source]
    pub source: std::io::Error,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, argv: &[&str], stdin: Option<&str>) -> Result<CommandOutput, RunnerError>;
}

/// Runs real processes on the local host.
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, argv: &[&str], stdin: Option<&str>) -> Result<CommandOutput, RunnerError> {
        debug!(command = argv.join(" "), "running local command");
        let argv0 = argv.first().copied().unwrap_or_default();
        let mut command = Command::new(argv0);
        command
            .args(&argv[1..])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = command.spawn().map_err(|source| RunnerError {
            argv0: argv0.to_string(),
            source,
        })?;

        if let Some(input) = stdin {
            if let Some(mut handle) = child.stdin.take() {
                handle
                    .write_all(input.as_bytes())
                    .await
                    .map_err(|source| RunnerError {
                        argv0: argv0.to_string(),
                        source,
                    })?;
                // Dropping the handle closes the pipe so the child sees EOF.
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| RunnerError {
                argv0: argv0.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status.code().unwrap_or(-1),
        })
    }
}
