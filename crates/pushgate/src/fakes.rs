//! In-memory executor fakes (testing only)
//!
//! `ScriptedExecutor` satisfies [`StageExecutor`] without spawning processes:
//! each stage name maps to a scripted outcome, and every invocation is
//! recorded together with the environment the stage observed.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::env::Environment;
use crate::error::StageError;
use crate::runner::{StageExecutor, StageExit};
use crate::stage::StageConfig;

/// Scripted outcome for a fake stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Exit with code 0.
    Pass,
    /// Exit with the given non-zero code.
    Fail(i32),
    /// Terminate without an exit code.
    Killed,
    /// Fail to launch with the given I/O error kind.
    LaunchError(io::ErrorKind),
}

/// One recorded call into the fake.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub stage: String,
    pub env: Environment,
    pub workspace: PathBuf,
}

/// Executor whose stages pass unless scripted otherwise.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    outcomes: HashMap<String, Outcome>,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome for the stage named `stage`.
    pub fn with(mut self, stage: impl Into<String>, outcome: Outcome) -> Self {
        self.outcomes.insert(stage.into(), outcome);
        self
    }

    /// Every invocation so far, in call order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Names of stages that were invoked, in call order.
    pub fn ran(&self) -> Vec<String> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .map(|i| i.stage.clone())
            .collect()
    }

    /// Environment observed by the first invocation of `stage`.
    pub fn env_seen_by(&self, stage: &str) -> Option<Environment> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.stage == stage)
            .map(|i| i.env.clone())
    }
}

#[async_trait]
impl StageExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        stage: &StageConfig,
        env: &Environment,
        workspace: &Path,
    ) -> Result<StageExit, StageError> {
        self.invocations.lock().unwrap().push(Invocation {
            stage: stage.name.clone(),
            env: env.clone(),
            workspace: workspace.to_path_buf(),
        });

        match self.outcomes.get(&stage.name).unwrap_or(&Outcome::Pass) {
            Outcome::Pass => Ok(StageExit::new(Some(0), 0)),
            Outcome::Fail(code) => Ok(StageExit::new(Some(*code), 0)),
            Outcome::Killed => Ok(StageExit::new(None, 0)),
            Outcome::LaunchError(kind) => Err(StageError::Launch {
                stage: stage.name.clone(),
                program: stage.command.first().cloned().unwrap_or_default(),
                source: io::Error::from(*kind),
            }),
        }
    }
}
