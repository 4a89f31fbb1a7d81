//! Linear run state machine.
//!
//! `NotStarted -> Running(0) -> Running(1) -> ... -> {Failed(i) | Succeeded}`.
//! No backward transitions, no re-entry from a terminal state.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum PipelineState {
    NotStarted,
    Running(usize),
    Failed(usize),
    Succeeded,
}

impl PipelineState {
    /// Enter stage `index`. Only the next stage in sequence may be entered.
    pub fn start_stage(self, index: usize) -> Result<Self, PipelineError> {
        match self {
            PipelineState::NotStarted if index == 0 => Ok(PipelineState::Running(0)),
            PipelineState::Running(i) if index == i + 1 => Ok(PipelineState::Running(index)),
            _ => Err(self.invalid(format!("running({index})"))),
        }
    }

    /// The running stage failed.
    pub fn fail(self) -> Result<Self, PipelineError> {
        match self {
            PipelineState::Running(i) => Ok(PipelineState::Failed(i)),
            _ => Err(self.invalid("failed")),
        }
    }

    /// The last of `total` stages completed.
    pub fn succeed(self, total: usize) -> Result<Self, PipelineError> {
        match self {
            PipelineState::Running(i) if i + 1 == total => Ok(PipelineState::Succeeded),
            _ => Err(self.invalid("succeeded")),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Failed(_) | PipelineState::Succeeded)
    }

    fn invalid(self, requested: impl Into<String>) -> PipelineError {
        PipelineError::InvalidTransition {
            current: self.to_string(),
            requested: requested.into(),
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::NotStarted => write!(f, "not_started"),
            PipelineState::Running(i) => write!(f, "running({i})"),
            PipelineState::Failed(i) => write!(f, "failed({i})"),
            PipelineState::Succeeded => write!(f, "succeeded"),
        }
    }
}
