//! Fail-fast stage pipeline.

use crate::env::{self, Environment};
use crate::error::{PipelineError, Result, StageError};
use crate::identity::{compute_pipeline_digest, short_digest};
use crate::runner::StageExecutor;
use crate::stage::{canonical_stages, BuiltinStage, StageConfig};
use crate::state::PipelineState;
use crate::telemetry::{
    emit_infrastructure_failure, emit_pipeline_finished, emit_pipeline_started,
    emit_stage_passed, emit_stage_started, emit_unclassified_builtin, emit_verification_failure,
    run_span,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Why a stage stopped the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// The command ran and returned non-zero: the code failed a check.
    Verification { exit_code: i32 },

    /// The command could not be launched: the check itself could not run.
    Infrastructure { exit_code: i32, error: String },
}

impl FailureKind {
    pub fn exit_code(&self) -> i32 {
        match self {
            FailureKind::Verification { exit_code } => *exit_code,
            FailureKind::Infrastructure { exit_code, .. } => *exit_code,
        }
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(self, FailureKind::Infrastructure { .. })
    }
}

/// The first stage that failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageFailure {
    /// Position of the stage in the pipeline.
    pub index: usize,

    /// Stage name.
    pub stage: String,

    #[serde(flatten)]
    pub kind: FailureKind,
}

/// Record of one stage that was started.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageRecord {
    /// Stage name.
    pub name: String,

    /// Exit code, if the command ran and produced one.
    pub exit_code: Option<i32>,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether the stage passed.
    pub passed: bool,
}

/// Result of a complete pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineResult {
    /// Unique id of this invocation.
    pub run_id: Uuid,

    /// Digest of the stage list and environment.
    pub pipeline_digest: String,

    /// When execution started.
    pub started_at: DateTime<Utc>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    /// Names of stages that ran to success, in order.
    pub completed: Vec<String>,

    /// First failing stage, if any.
    pub failure: Option<StageFailure>,

    /// Every stage that was started, in order.
    pub stages: Vec<StageRecord>,

    /// 0 when every stage passed, otherwise the failing stage's code.
    pub exit_code: i32,

    /// Terminal state of the run.
    pub state: PipelineState,
}

impl PipelineResult {
    /// Whether all stages passed.
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }

    /// Name of the failing stage, if any.
    pub fn failing_stage(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.stage.as_str())
    }
}

/// Ordered, immutable list of stages plus the environment they run under.
#[derive(Debug, Clone)]
pub struct StagePipeline {
    stages: Vec<StageConfig>,
    base_env: Environment,
    workspace: PathBuf,
}

impl StagePipeline {
    /// Build a pipeline, validating the stage list.
    ///
    /// Rejects an empty list, empty commands, duplicate names, and builtin
    /// stages that are repeated or out of canonical order. Custom stages are
    /// not order-checked; one that runs a builtin's cargo subcommand is logged
    /// as a warning.
    pub fn new(stages: Vec<StageConfig>, base_env: Environment) -> Result<Self> {
        if stages.is_empty() {
            return Err(PipelineError::Empty);
        }

        let mut names = HashSet::new();
        let mut last_builtin: Option<(BuiltinStage, &str)> = None;

        for stage in &stages {
            if stage.command.is_empty() {
                return Err(PipelineError::EmptyCommand(stage.name.clone()));
            }
            if !names.insert(stage.name.as_str()) {
                return Err(PipelineError::DuplicateStage(stage.name.clone()));
            }
            let Some(kind) = stage.kind else {
                if let Some(resembles) = BuiltinStage::matching(&stage.command) {
                    emit_unclassified_builtin(&stage.name, resembles.id());
                }
                continue;
            };
            if let Some((prev_kind, prev_name)) = last_builtin {
                if prev_kind.rank() >= kind.rank() {
                    return Err(PipelineError::StageOrder {
                        stage: stage.name.clone(),
                        kind: kind.to_string(),
                        after: prev_name.to_string(),
                    });
                }
            }
            last_builtin = Some((kind, stage.name.as_str()));
        }

        Ok(Self {
            stages,
            base_env,
            workspace: PathBuf::from("."),
        })
    }

    /// The canonical pipeline: fmt, build, lint, test with warnings denied.
    pub fn canonical() -> Self {
        Self {
            stages: canonical_stages(),
            base_env: env::warnings_as_errors(),
            workspace: PathBuf::from("."),
        }
    }

    /// Run commands in `workspace` instead of the current directory.
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    pub fn stages(&self) -> &[StageConfig] {
        &self.stages
    }

    pub fn base_env(&self) -> &Environment {
        &self.base_env
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn digest(&self) -> String {
        compute_pipeline_digest(&self.stages, &self.base_env)
    }

    /// Environment `stage` runs with: base layered with its overrides.
    pub fn stage_env(&self, stage: &StageConfig) -> Environment {
        env::merge(&self.base_env, &stage.env)
    }

    /// Execute every stage in order, stopping at the first failure.
    ///
    /// A stage that fails to launch stops the pipeline just like a stage that
    /// exits non-zero, but is reported as an infrastructure failure. The
    /// only `Err` is an internal state machine violation.
    pub async fn run(&self, executor: &dyn StageExecutor) -> Result<PipelineResult> {
        let run_id = Uuid::new_v4();
        self.run_stages(run_id, executor)
            .instrument(run_span(&run_id.to_string()))
            .await
    }

    async fn run_stages(
        &self,
        run_id: Uuid,
        executor: &dyn StageExecutor,
    ) -> Result<PipelineResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let pipeline_digest = self.digest();

        emit_pipeline_started(
            &run_id.to_string(),
            short_digest(&pipeline_digest),
            self.stages.len(),
        );

        let mut state = PipelineState::NotStarted;
        let mut completed = Vec::new();
        let mut records = Vec::new();
        let mut failure = None;

        for (index, stage) in self.stages.iter().enumerate() {
            state = state.start_stage(index)?;
            emit_stage_started(index, &stage.name, &stage.command_line());

            let stage_start = Instant::now();
            let env = self.stage_env(stage);

            match executor.execute(stage, &env, &self.workspace).await {
                Ok(exit) if exit.success() => {
                    emit_stage_passed(index, &stage.name, exit.duration_ms);
                    records.push(StageRecord {
                        name: stage.name.clone(),
                        exit_code: exit.code,
                        duration_ms: exit.duration_ms,
                        passed: true,
                    });
                    completed.push(stage.name.clone());
                }
                Ok(exit) => {
                    let exit_code = exit.reported_code();
                    emit_verification_failure(index, &stage.name, exit_code);
                    records.push(StageRecord {
                        name: stage.name.clone(),
                        exit_code: exit.code,
                        duration_ms: exit.duration_ms,
                        passed: false,
                    });
                    failure = Some(StageFailure {
                        index,
                        stage: stage.name.clone(),
                        kind: FailureKind::Verification { exit_code },
                    });
                    break;
                }
                Err(err) => {
                    emit_infrastructure_failure(index, &stage.name, &err);
                    records.push(StageRecord {
                        name: stage.name.clone(),
                        exit_code: None,
                        duration_ms: stage_start.elapsed().as_millis() as u64,
                        passed: false,
                    });
                    failure = Some(infrastructure_failure(index, stage, &err));
                    break;
                }
            }
        }

        state = if failure.is_some() {
            state.fail()?
        } else {
            state.succeed(self.stages.len())?
        };

        let exit_code = failure.as_ref().map_or(0, |f| f.kind.exit_code());
        let duration_ms = start.elapsed().as_millis() as u64;
        emit_pipeline_finished(
            &run_id.to_string(),
            duration_ms,
            exit_code,
            failure.is_none(),
        );

        Ok(PipelineResult {
            run_id,
            pipeline_digest,
            started_at,
            duration_ms,
            completed,
            failure,
            stages: records,
            exit_code,
            state,
        })
    }
}

fn infrastructure_failure(index: usize, stage: &StageConfig, err: &StageError) -> StageFailure {
    StageFailure {
        index,
        stage: stage.name.clone(),
        kind: FailureKind::Infrastructure {
            exit_code: err.exit_code(),
            error: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{Outcome, ScriptedExecutor};
    use tracing_test::traced_test;

    fn echo(name: &str) -> StageConfig {
        StageConfig::custom(name, vec!["echo".to_string(), name.to_string()])
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        let err = StagePipeline::new(vec![], Environment::new()).unwrap_err();
        assert!(matches!(err, PipelineError::Empty));
    }

    #[test]
    fn test_empty_command_rejected() {
        let err = StagePipeline::new(vec![StageConfig::custom("x", vec![])], Environment::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyCommand(name) if name == "x"));
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let err = StagePipeline::new(vec![echo("a"), echo("a")], Environment::new()).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateStage(_)));
    }

    #[test]
    fn test_out_of_order_builtin_rejected() {
        let stages = vec![
            StageConfig::from_builtin(BuiltinStage::Build),
            StageConfig::from_builtin(BuiltinStage::Fmt),
        ];
        let err = StagePipeline::new(stages, Environment::new()).unwrap_err();
        match err {
            PipelineError::StageOrder { stage, after, .. } => {
                assert_eq!(stage, "Run Fmt");
                assert_eq!(after, "Run Build");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_repeated_builtin_rejected() {
        let stages = vec![
            StageConfig::from_builtin(BuiltinStage::Test),
            StageConfig::custom("Run Tests Again", BuiltinStage::Test.command())
                .with_kind(BuiltinStage::Test),
        ];
        assert!(StagePipeline::new(stages, Environment::new()).is_err());
    }

    #[test]
    fn test_custom_stages_interleave_with_builtins() {
        let stages = vec![
            StageConfig::from_builtin(BuiltinStage::Fmt),
            echo("audit"),
            StageConfig::from_builtin(BuiltinStage::Test),
        ];
        let pipeline = StagePipeline::new(stages, Environment::new()).unwrap();
        assert_eq!(pipeline.stage_names(), vec!["Run Fmt", "audit", "Run Tests"]);
    }

    #[traced_test]
    #[test]
    fn test_unkinded_builtin_command_warns() {
        let stages = vec![
            StageConfig::from_builtin(BuiltinStage::Test),
            StageConfig::custom("my clippy", BuiltinStage::Lint.command()),
        ];
        let pipeline = StagePipeline::new(stages, Environment::new()).unwrap();

        assert_eq!(pipeline.stage_names(), vec!["Run Tests", "my clippy"]);
        assert!(logs_contain("stage.unclassified_builtin"));
        assert!(logs_contain("my clippy"));
    }

    #[traced_test]
    #[test]
    fn test_plain_custom_stage_does_not_warn() {
        StagePipeline::new(vec![echo("audit")], Environment::new()).unwrap();
        assert!(!logs_contain("stage.unclassified_builtin"));
    }

    #[test]
    fn test_canonical_pipeline_shape() {
        let pipeline = StagePipeline::canonical();
        assert_eq!(
            pipeline.stage_names(),
            vec!["Run Fmt", "Run Build", "Run Clippy", "Run Tests"]
        );
        assert_eq!(pipeline.base_env()["RUSTFLAGS"], "-Dwarnings");
        assert!(StagePipeline::new(pipeline.stages().to_vec(), Environment::new()).is_ok());
    }

    #[tokio::test]
    async fn test_canonical_runs_in_order() {
        let executor = ScriptedExecutor::new();
        let result = StagePipeline::canonical().run(&executor).await.unwrap();

        assert_eq!(
            executor.ran(),
            vec!["Run Fmt", "Run Build", "Run Clippy", "Run Tests"]
        );
        assert!(result.success());
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.state, PipelineState::Succeeded);
    }

    #[tokio::test]
    async fn test_warnings_flag_reaches_every_stage() {
        let executor = ScriptedExecutor::new();
        StagePipeline::canonical().run(&executor).await.unwrap();

        for invocation in executor.invocations() {
            assert_eq!(invocation.env["RUSTFLAGS"], "-Dwarnings", "{}", invocation.stage);
        }
    }

    #[tokio::test]
    async fn test_killed_stage_falls_back_to_one() {
        let executor = ScriptedExecutor::new().with("b", Outcome::Killed);
        let pipeline =
            StagePipeline::new(vec![echo("a"), echo("b"), echo("c")], Environment::new()).unwrap();

        let result = pipeline.run(&executor).await.unwrap();
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.failing_stage(), Some("b"));
        assert_eq!(result.state, PipelineState::Failed(1));
        assert_eq!(executor.ran(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_workspace_is_passed_through() {
        let executor = ScriptedExecutor::new();
        let pipeline = StagePipeline::new(vec![echo("a")], Environment::new())
            .unwrap()
            .with_workspace("/tmp/checkout");

        pipeline.run(&executor).await.unwrap();
        assert_eq!(
            executor.invocations()[0].workspace,
            PathBuf::from("/tmp/checkout")
        );
    }

    #[tokio::test]
    async fn test_result_serializes_failure_kind() {
        let executor = ScriptedExecutor::new().with("a", Outcome::Fail(4));
        let pipeline = StagePipeline::new(vec![echo("a")], Environment::new()).unwrap();

        let result = pipeline.run(&executor).await.unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["failure"]["kind"], "verification");
        assert_eq!(json["failure"]["exit_code"], 4);
        assert_eq!(json["exit_code"], 4);
    }
}
