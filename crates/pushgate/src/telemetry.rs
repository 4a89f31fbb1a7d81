//! Tracing initialisation and pipeline lifecycle events.
//!
//! Call [`init_tracing`] once at program start. The `emit_*` functions log the
//! lifecycle points of a pipeline run with a stable `event` field so log
//! consumers can filter on them. Verification and infrastructure failures use
//! different event names and levels.

use tracing::{error, info, warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// * `json` — emit newline-delimited JSON log lines.
/// * `level` — default verbosity when `RUST_LOG` is not set.
///
/// Only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    // Stage commands own stdout; logs go to stderr.
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

/// Span carrying the run id; every lifecycle event of a run is emitted inside it.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("pushgate.run", run_id = %run_id)
}

pub fn emit_pipeline_started(run_id: &str, digest: &str, stage_count: usize) {
    info!(
        event = "pipeline.started",
        run_id = %run_id,
        digest = %digest,
        stages = stage_count,
    );
}

pub fn emit_stage_started(index: usize, stage: &str, command: &str) {
    info!(event = "stage.started", index = index, stage = %stage, command = %command);
}

pub fn emit_stage_passed(index: usize, stage: &str, duration_ms: u64) {
    info!(event = "stage.passed", index = index, stage = %stage, duration_ms = duration_ms);
}

/// The stage ran and reported a problem with the code under test.
pub fn emit_verification_failure(index: usize, stage: &str, exit_code: i32) {
    warn!(
        event = "stage.verification_failure",
        index = index,
        stage = %stage,
        exit_code = exit_code,
    );
}

/// The stage could not be launched; the pipeline itself is broken.
pub fn emit_infrastructure_failure(index: usize, stage: &str, error: &dyn std::fmt::Display) {
    error!(
        event = "stage.infrastructure_failure",
        index = index,
        stage = %stage,
        error = %error,
    );
}

/// A stage with no builtin kind runs a builtin's cargo subcommand, so it is
/// exempt from the canonical order check.
pub fn emit_unclassified_builtin(stage: &str, resembles: &str) {
    warn!(
        event = "stage.unclassified_builtin",
        stage = %stage,
        resembles = %resembles,
        "stage runs a builtin command without declaring its kind; order is not checked",
    );
}

pub fn emit_pipeline_finished(run_id: &str, duration_ms: u64, exit_code: i32, success: bool) {
    info!(
        event = "pipeline.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        exit_code = exit_code,
        success = success,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_verification_failure_is_tagged() {
        emit_verification_failure(2, "Run Clippy", 101);
        assert!(logs_contain("stage.verification_failure"));
        assert!(logs_contain("Run Clippy"));
    }

    #[traced_test]
    #[test]
    fn test_infrastructure_failure_is_tagged() {
        emit_infrastructure_failure(0, "Run Fmt", &"cargo: not found");
        assert!(logs_contain("stage.infrastructure_failure"));
        assert!(!logs_contain("stage.verification_failure"));
    }

    #[traced_test]
    #[test]
    fn test_unclassified_builtin_is_tagged() {
        emit_unclassified_builtin("my clippy", "lint");
        assert!(logs_contain("stage.unclassified_builtin"));
        assert!(logs_contain("my clippy"));
    }

    #[traced_test]
    #[test]
    fn test_run_span_carries_run_id() {
        let _span = run_span("run-abc").entered();
        emit_stage_passed(0, "Run Fmt", 5);
        assert!(logs_contain("run-abc"));
    }
}
