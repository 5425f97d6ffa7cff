//! Command runner abstraction
//!
//! Components never spawn processes directly; they hold a
//! `CommandRunner` so that tests can substitute a scripted runner.

use super::{CommandOutput, CommandSpec};
use crate::error::{RiggerError, RiggerResult};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Executes external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion.
    ///
    /// Returns `Err` only when the process could not be spawned; a non-zero
    /// exit is reported through `CommandOutput::code`.
    async fn run(&self, spec: &CommandSpec) -> RiggerResult<CommandOutput>;
}

/// Runner that spawns real processes with `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).envs(&spec.env).kill_on_drop(true);
        if let Some(ref dir) = spec.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> RiggerResult<CommandOutput> {
        debug!("Executing: {}", spec);

        let mut cmd = Self::command(spec);

        if spec.capture {
            let output = cmd
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await
                .map_err(|e| RiggerError::command_failed(spec.display(), e))?;

            Ok(CommandOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        } else {
            let status = cmd
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .map_err(|e| RiggerError::command_failed(spec.display(), e))?;

            Ok(CommandOutput {
                code: status.code(),
                ..CommandOutput::default()
            })
        }
    }
}
