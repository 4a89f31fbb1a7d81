//! Stage execution.
//!
//! [`StageExecutor`] is the seam between the pipeline and the outside world.
//! [`CommandExecutor`] runs real processes; tests substitute
//! [`crate::fakes::ScriptedExecutor`].

use crate::env::Environment;
use crate::error::StageError;
use crate::stage::StageConfig;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

/// How a launched stage command terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageExit {
    /// Process exit code. `None` when the process ended without one
    /// (e.g. killed by a signal).
    pub code: Option<i32>,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl StageExit {
    pub fn new(code: Option<i32>, duration_ms: u64) -> Self {
        Self { code, duration_ms }
    }

    /// Whether the command exited with code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code to report, falling back to 1 when none is available.
    pub fn reported_code(&self) -> i32 {
        self.code.unwrap_or(1)
    }
}

/// Something that can run a stage against a workspace.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Run `stage` to completion with the fully merged environment `env`.
    ///
    /// Returns `Err` only when the command could not be launched. A command
    /// that ran and exited non-zero is an `Ok` with a failing [`StageExit`].
    async fn execute(
        &self,
        stage: &StageConfig,
        env: &Environment,
        workspace: &Path,
    ) -> std::result::Result<StageExit, StageError>;
}

/// Executor that spawns the stage command as a child process.
///
/// The child inherits the process environment with `env` layered on top,
/// inherits stdout/stderr so output streams live, and gets no stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandExecutor;

#[async_trait]
impl StageExecutor for CommandExecutor {
    async fn execute(
        &self,
        stage: &StageConfig,
        env: &Environment,
        workspace: &Path,
    ) -> std::result::Result<StageExit, StageError> {
        let (program, args) =
            stage
                .command
                .split_first()
                .ok_or_else(|| StageError::EmptyCommand {
                    stage: stage.name.clone(),
                })?;

        // A bad cwd surfaces from spawn as NotFound, indistinguishable from
        // a missing program.
        if !workspace.is_dir() {
            return Err(StageError::Workspace {
                stage: stage.name.clone(),
                path: workspace.display().to_string(),
            });
        }

        debug!(stage = %stage.name, command = %stage.command_line(), "spawning stage command");

        let start = Instant::now();
        let status = Command::new(program)
            .args(args)
            .envs(env)
            .current_dir(workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| StageError::Launch {
                stage: stage.name.clone(),
                program: program.clone(),
                source,
            })?;

        Ok(StageExit::new(
            status.code(),
            start.elapsed().as_millis() as u64,
        ))
    }
}
