//! Trigger matching.
//!
//! The hosting CI platform tells us which event started the job; the pipeline
//! only runs for events its definition lists. The default is `push` only.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An event that may start a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TriggerEvent {
    Push,
    PullRequest,
    WorkflowDispatch,
    Other(String),
}

impl TriggerEvent {
    pub fn as_str(&self) -> &str {
        match self {
            TriggerEvent::Push => "push",
            TriggerEvent::PullRequest => "pull_request",
            TriggerEvent::WorkflowDispatch => "workflow_dispatch",
            TriggerEvent::Other(name) => name,
        }
    }
}

impl From<String> for TriggerEvent {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "push" => TriggerEvent::Push,
            "pull_request" => TriggerEvent::PullRequest,
            "workflow_dispatch" => TriggerEvent::WorkflowDispatch,
            other => TriggerEvent::Other(other.to_string()),
        }
    }
}

impl From<TriggerEvent> for String {
    fn from(event: TriggerEvent) -> Self {
        event.as_str().to_string()
    }
}

impl FromStr for TriggerEvent {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TriggerEvent::from(s.to_string()))
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of events a pipeline responds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub on: Vec<TriggerEvent>,
}

impl Trigger {
    pub fn new(on: Vec<TriggerEvent>) -> Self {
        Self { on }
    }

    /// Whether `event` should start the pipeline.
    pub fn matches(&self, event: &TriggerEvent) -> bool {
        self.on.contains(event)
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Self {
            on: vec![TriggerEvent::Push],
        }
    }
}
