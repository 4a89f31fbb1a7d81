//! Human and JSON rendering of a pipeline result.

use crate::pipeline::{FailureKind, PipelineResult};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::str::FromStr;

/// Output format for [`render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format: {other}")),
        }
    }
}

/// Render `result` in the requested format.
pub fn render(result: &PipelineResult, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(render_text(result)),
        ReportFormat::Json => serde_json::to_string_pretty(result),
    }
}

/// One line per started stage, then a summary naming the failing stage and
/// whether the code or the pipeline itself is at fault.
pub fn render_text(result: &PipelineResult) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Run ID: {}", result.run_id);
    let _ = writeln!(
        out,
        "Status: {}",
        if result.success() { "✓ PASSED" } else { "✗ FAILED" }
    );
    let _ = writeln!(out, "Duration: {}ms", result.duration_ms);
    out.push('\n');

    for stage in &result.stages {
        let status = if stage.passed { "✓" } else { "✗" };
        let code = stage
            .exit_code
            .map_or_else(|| "none".to_string(), |c| c.to_string());
        let _ = writeln!(
            out,
            "  {} {} ({}ms, exit code: {})",
            status, stage.name, stage.duration_ms, code
        );
    }

    out.push('\n');
    match &result.failure {
        None => {
            let _ = writeln!(out, "✓ All {} stages passed", result.completed.len());
        }
        Some(failure) => match &failure.kind {
            FailureKind::Verification { exit_code } => {
                let _ = writeln!(
                    out,
                    "Verification failure in '{}' (exit code {})",
                    failure.stage, exit_code
                );
            }
            FailureKind::Infrastructure { exit_code, error } => {
                let _ = writeln!(
                    out,
                    "Infrastructure failure in '{}' (exit code {}): {}",
                    failure.stage, exit_code, error
                );
                let _ = writeln!(out, "The check could not run; this is not a code problem.");
            }
        },
    }

    out
}
