//! Pipeline definition files.
//!
//! A definition is a TOML document listing the trigger events, the base
//! environment and the ordered stages:
//!
//! ```toml
//! on = ["push"]
//!
//! [env]
//! RUSTFLAGS = "-Dwarnings"
//!
//! [[stages]]
//! kind = "fmt"
//!
//! [[stages]]
//! name = "Run Build"
//! kind = "build"
//! command = ["cargo", "build", "--verbose"]
//! ```
//!
//! A stage with a `kind` may omit `name` and `command`; the builtin values
//! are used. The `[env]` table is layered over `RUSTFLAGS=-Dwarnings`, so
//! leaving it out keeps warnings denied. A relative `workspace` is resolved
//! against the directory holding the definition file.

use crate::env::{self, Environment};
use crate::error::{DefinitionError, PipelineError};
use crate::pipeline::StagePipeline;
use crate::stage::{BuiltinStage, StageConfig};
use crate::trigger::{Trigger, TriggerEvent};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default definition file name, looked up in the workspace root.
pub const DEFAULT_DEFINITION_FILE: &str = "pushgate.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PipelineDefinition {
    /// Events that start the pipeline.
    #[serde(default = "default_on")]
    pub on: Vec<TriggerEvent>,

    /// Base environment applied to every stage, on top of warnings-as-errors.
    #[serde(default)]
    pub env: Environment,

    /// Directory stage commands run in. Relative to the definition file when
    /// loaded with [`PipelineDefinition::load`], otherwise to the caller's cwd.
    #[serde(default)]
    pub workspace: Option<PathBuf>,

    /// Ordered stages.
    pub stages: Vec<StageDefinition>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StageDefinition {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub kind: Option<BuiltinStage>,

    #[serde(default)]
    pub command: Option<Vec<String>>,

    #[serde(default)]
    pub env: Environment,
}

fn default_on() -> Vec<TriggerEvent> {
    vec![TriggerEvent::Push]
}

impl StageDefinition {
    /// Fill in builtin defaults and produce a stage configuration.
    pub fn resolve(self) -> Result<StageConfig, DefinitionError> {
        let command = match (self.command, self.kind) {
            (Some(command), _) => command,
            (None, Some(kind)) => kind.command(),
            (None, None) => {
                return Err(DefinitionError::MissingCommand(
                    self.name.unwrap_or_else(|| "<unnamed>".to_string()),
                ))
            }
        };
        let name = self
            .name
            .or_else(|| self.kind.map(|k| k.name().to_string()))
            .unwrap_or_else(|| command.join(" "));

        Ok(StageConfig {
            name,
            command,
            env: self.env,
            kind: self.kind,
        })
    }
}

impl PipelineDefinition {
    pub fn from_toml_str(source: &str) -> Result<Self, DefinitionError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, DefinitionError> {
        debug!(path = %path.display(), "loading pipeline definition");
        let source = std::fs::read_to_string(path).map_err(|source| DefinitionError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut definition = Self::from_toml_str(&source)?;

        if let (Some(dir), Some(base)) = (definition.workspace.as_ref(), path.parent()) {
            if dir.is_relative() {
                definition.workspace = Some(base.join(dir));
            }
        }
        Ok(definition)
    }

    pub fn trigger(&self) -> Trigger {
        Trigger::new(self.on.clone())
    }

    /// Resolve stages and validate them into a runnable pipeline.
    pub fn into_pipeline(self) -> Result<StagePipeline, PipelineError> {
        let stages = self
            .stages
            .into_iter()
            .map(StageDefinition::resolve)
            .collect::<Result<Vec<_>, _>>()?;

        let base_env = env::merge(&env::warnings_as_errors(), &self.env);
        let pipeline = StagePipeline::new(stages, base_env)?;
        Ok(match self.workspace {
            Some(dir) => pipeline.with_workspace(dir),
            None => pipeline,
        })
    }
}
