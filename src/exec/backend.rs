// src/exec/backend.rs

//! Pluggable command runner abstraction.
//!
//! Local git and the ssh transport talk to a `CommandRunner` instead of
//! spawning processes directly, so tests can swap in a runner that records
//! invocations and returns canned output.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::{Result, ShipyardError};

use super::command::{CommandOutput, CommandSpec};

/// Trait abstracting how a local command is executed.
///
/// Implementations return `Ok` for any command that ran to completion (even
/// with a non-zero status) and `Err` only when the command could not be
/// started or exceeded its timeout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Production runner backed by `tokio::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!(cmd = %spec, "running command");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            ShipyardError::IoError(std::io::Error::new(
                e.kind(),
                format!("spawning '{}': {e}", spec.program),
            ))
        })?;

        if let Some(input) = &spec.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(input.as_bytes()).await?;
                // Dropping closes the pipe so `bash -s` sees EOF.
                drop(stdin);
            }
        }

        let wait = child.wait_with_output();
        let output = match spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(res) => res?,
                Err(_) => {
                    // The child is killed when the dropped future releases it.
                    warn!(cmd = %spec, timeout_secs = limit.as_secs(), "command timed out");
                    return Err(ShipyardError::transport(format!(
                        "'{}' timed out after {}s",
                        spec.program,
                        limit.as_secs()
                    )));
                }
            },
            None => wait.await?,
        };

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        for line in result.stderr.lines() {
            debug!(program = %spec.program, "stderr: {}", line);
        }
        debug!(cmd = %spec, exit_code = ?result.exit_code, "command finished");

        Ok(result)
    }
}
