//! Error types for pipeline construction and stage execution.

use std::io;
use thiserror::Error;

/// Errors raised while building a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline has no stages")]
    Empty,

    #[error("stage '{0}' has an empty command")]
    EmptyCommand(String),

    #[error("duplicate stage name: {0}")]
    DuplicateStage(String),

    #[error("stage '{stage}' ({kind}) must not run after '{after}'")]
    StageOrder {
        stage: String,
        kind: String,
        after: String,
    },

    #[error("invalid pipeline state transition: {current} -> {requested}")]
    InvalidTransition { current: String, requested: String },

    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),
}

/// Errors raised while loading a pipeline definition file.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid definition: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("stage '{0}' has no command and no builtin kind")]
    MissingCommand(String),
}

/// A stage command that could not be launched at all.
///
/// This is the infrastructure side of the failure split: the check itself
/// could not run, as opposed to running and reporting a problem.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("stage '{stage}' has an empty command")]
    EmptyCommand { stage: String },

    #[error("workspace {path} for stage '{stage}' is not a directory")]
    Workspace { stage: String, path: String },

    #[error("failed to launch '{program}' for stage '{stage}': {source}")]
    Launch {
        stage: String,
        program: String,
        #[source]
        source: io::Error,
    },
}

impl StageError {
    /// Exit code surfaced for a launch failure.
    ///
    /// Follows the shell convention: 127 not found, 126 not executable,
    /// 125 anything else. A missing workspace is 125, so 127 always means
    /// the program itself was not found.
    pub fn exit_code(&self) -> i32 {
        match self {
            StageError::Launch { source, .. } => match source.kind() {
                io::ErrorKind::NotFound => 127,
                io::ErrorKind::PermissionDenied => 126,
                _ => 125,
            },
            StageError::EmptyCommand { .. } | StageError::Workspace { .. } => 125,
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
