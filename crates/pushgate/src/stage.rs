//! Stage definitions and configuration.

use crate::env::Environment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Builtin verification stages, declared in canonical order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinStage {
    /// cargo fmt --all -- --check
    Fmt,

    /// cargo build --verbose
    Build,

    /// cargo clippy --all-targets --all-features
    Lint,

    /// cargo test --verbose
    Test,
}

impl BuiltinStage {
    /// All builtin stages in the order the pipeline runs them.
    pub const CANONICAL_ORDER: [BuiltinStage; 4] = [
        BuiltinStage::Fmt,
        BuiltinStage::Build,
        BuiltinStage::Lint,
        BuiltinStage::Test,
    ];

    /// Position of this stage in the canonical order.
    pub fn rank(&self) -> usize {
        match self {
            BuiltinStage::Fmt => 0,
            BuiltinStage::Build => 1,
            BuiltinStage::Lint => 2,
            BuiltinStage::Test => 3,
        }
    }

    /// Get the stage's display name.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinStage::Fmt => "Run Fmt",
            BuiltinStage::Build => "Run Build",
            BuiltinStage::Lint => "Run Clippy",
            BuiltinStage::Test => "Run Tests",
        }
    }

    /// Short machine identifier, as used in definition files.
    pub fn id(&self) -> &'static str {
        match self {
            BuiltinStage::Fmt => "fmt",
            BuiltinStage::Build => "build",
            BuiltinStage::Lint => "lint",
            BuiltinStage::Test => "test",
        }
    }

    /// Get the stage's command.
    pub fn command(&self) -> Vec<String> {
        let argv: &[&str] = match self {
            BuiltinStage::Fmt => &["cargo", "fmt", "--all", "--", "--check"],
            BuiltinStage::Build => &["cargo", "build", "--verbose"],
            BuiltinStage::Lint => &["cargo", "clippy", "--all-targets", "--all-features"],
            BuiltinStage::Test => &["cargo", "test", "--verbose"],
        };
        argv.iter().map(|s| s.to_string()).collect()
    }

    /// The builtin whose cargo subcommand `command` invokes, if any.
    ///
    /// Looks at the program and the first non-toolchain argument only, so
    /// `cargo +nightly clippy --workspace` matches [`BuiltinStage::Lint`].
    pub fn matching(command: &[String]) -> Option<BuiltinStage> {
        let (program, args) = command.split_first()?;
        let program = Path::new(program).file_name()?.to_str()?;
        if program != "cargo" {
            return None;
        }
        let subcommand = args.iter().find(|arg| !arg.starts_with('+'))?;
        Self::CANONICAL_ORDER
            .into_iter()
            .find(|stage| stage.command()[1] == *subcommand)
    }
}

impl fmt::Display for BuiltinStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Configuration for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageConfig {
    /// Human-readable stage name.
    pub name: String,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Environment overrides applied on top of the pipeline's base environment.
    #[serde(default)]
    pub env: Environment,

    /// Builtin classification, if any. Only classified stages are order-checked.
    #[serde(default)]
    pub kind: Option<BuiltinStage>,
}

impl StageConfig {
    /// Create a new stage configuration from a builtin stage.
    pub fn from_builtin(stage: BuiltinStage) -> Self {
        Self {
            name: stage.name().to_string(),
            command: stage.command(),
            env: Environment::new(),
            kind: Some(stage),
        }
    }

    /// Create a custom stage configuration.
    pub fn custom(name: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command,
            env: Environment::new(),
            kind: None,
        }
    }

    /// Add an environment override for this stage.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Mark this stage as playing a builtin role.
    pub fn with_kind(mut self, kind: BuiltinStage) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Command rendered as a single shell-like string, for logs and reports.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// The four builtin stages in canonical order.
pub fn canonical_stages() -> Vec<StageConfig> {
    BuiltinStage::CANONICAL_ORDER
        .iter()
        .map(|s| StageConfig::from_builtin(*s))
        .collect()
}
