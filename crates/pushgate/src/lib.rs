//! pushgate - fail-fast verification pipeline
//!
//! Runs an ordered list of verification stages against a workspace:
//! - Builtin Cargo stages in canonical order (fmt, build, clippy, test)
//! - Warnings escalated to errors through an explicit base environment
//! - Stops at the first failing stage and reports it
//! - Separates verification failures from infrastructure failures

pub mod definition;
pub mod env;
pub mod error;
pub mod fakes;
pub mod identity;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod stage;
pub mod state;
pub mod telemetry;
pub mod trigger;

// Re-export key types
pub use definition::{PipelineDefinition, StageDefinition, DEFAULT_DEFINITION_FILE};
pub use env::Environment;
pub use error::{DefinitionError, PipelineError, Result, StageError};
pub use pipeline::{FailureKind, PipelineResult, StageFailure, StagePipeline, StageRecord};
pub use report::{render, ReportFormat};
pub use runner::{CommandExecutor, StageExecutor, StageExit};
pub use stage::{canonical_stages, BuiltinStage, StageConfig};
pub use state::PipelineState;
pub use telemetry::init_tracing;
pub use trigger::{Trigger, TriggerEvent};
