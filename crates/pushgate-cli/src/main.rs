//! pushgate - fail-fast verification pipeline CLI
//!
//! ## Commands
//!
//! - `run`: run the pipeline and exit with the first failing stage's code
//! - `stages`: print the resolved stage list without running anything

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pushgate::{
    init_tracing, render, CommandExecutor, PipelineDefinition, ReportFormat, StagePipeline,
    Trigger, TriggerEvent, DEFAULT_DEFINITION_FILE,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "pushgate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fail-fast verification pipeline (fmt, build, lint, test)", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage in order, stopping at the first failure
    Run {
        /// Workspace the stage commands run in (default: the definition's, relative to its file, else current directory)
        #[arg(short, long, env = "PUSHGATE_WORKSPACE")]
        workspace: Option<PathBuf>,

        /// Pipeline definition file (default: pushgate.toml in the workspace, else builtin)
        #[arg(short, long, env = "PUSHGATE_CONFIG")]
        config: Option<PathBuf>,

        /// Event that triggered this invocation (falls back to GITHUB_EVENT_NAME, then push)
        #[arg(long, env = "PUSHGATE_EVENT")]
        event: Option<String>,

        /// Report format: text or json
        #[arg(long, default_value = "text")]
        format: ReportFormat,
    },

    /// Print the resolved stages and their environment
    Stages {
        /// Workspace to look for the definition file in
        #[arg(short, long, env = "PUSHGATE_WORKSPACE")]
        workspace: Option<PathBuf>,

        /// Pipeline definition file
        #[arg(short, long, env = "PUSHGATE_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json_logs, level);

    match cli.command {
        Commands::Run {
            workspace,
            config,
            event,
            format,
        } => {
            let event = resolve_event(event, std::env::var("GITHUB_EVENT_NAME").ok());
            let code = cmd_run(workspace.as_deref(), config.as_deref(), &event, format).await?;
            Ok(ExitCode::from(code))
        }
        Commands::Stages { workspace, config } => {
            cmd_stages(workspace.as_deref(), config.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run the pipeline and map its outcome to the process exit code.
async fn cmd_run(
    workspace: Option<&Path>,
    config: Option<&Path>,
    event: &TriggerEvent,
    format: ReportFormat,
) -> Result<u8> {
    let (pipeline, trigger) = resolve_pipeline(workspace, config)?;

    if !trigger.matches(event) {
        info!(event = %event, "event does not trigger this pipeline; nothing to do");
        return Ok(0);
    }

    let result = pipeline
        .run(&CommandExecutor)
        .await
        .context("pipeline aborted")?;

    let report = render(&result, format).context("failed to render report")?;
    println!("{report}");

    Ok(exit_status(result.exit_code))
}

fn cmd_stages(workspace: Option<&Path>, config: Option<&Path>) -> Result<()> {
    let (pipeline, trigger) = resolve_pipeline(workspace, config)?;

    let events: Vec<_> = trigger.on.iter().map(TriggerEvent::as_str).collect();
    println!("Trigger: {}", events.join(", "));
    println!("Workspace: {}", pipeline.workspace().display());
    println!("Digest: {}", pipeline.digest());
    println!();

    for (i, stage) in pipeline.stages().iter().enumerate() {
        println!("  {}. {}: {}", i + 1, stage.name, stage.command_line());
        for (key, value) in pipeline.stage_env(stage) {
            println!("       {key}={value}");
        }
    }

    Ok(())
}

/// Pick the definition: explicit file, then `pushgate.toml` in the
/// workspace, then the builtin canonical pipeline.
fn resolve_pipeline(
    workspace: Option<&Path>,
    config: Option<&Path>,
) -> Result<(StagePipeline, Trigger)> {
    let lookup_dir = workspace.unwrap_or_else(|| Path::new("."));
    let default_file = lookup_dir.join(DEFAULT_DEFINITION_FILE);

    let definition_path = match config {
        Some(path) => Some(path.to_path_buf()),
        None if default_file.is_file() => Some(default_file),
        None => None,
    };

    let (pipeline, trigger) = match definition_path {
        Some(path) => {
            info!(path = %path.display(), "using pipeline definition");
            let definition = PipelineDefinition::load(&path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            let trigger = definition.trigger();
            let pipeline = definition
                .into_pipeline()
                .with_context(|| format!("invalid pipeline in {}", path.display()))?;
            (pipeline, trigger)
        }
        None => {
            info!("no definition file found, using builtin pipeline");
            (StagePipeline::canonical(), Trigger::default())
        }
    };

    Ok(match workspace {
        Some(dir) => (pipeline.with_workspace(dir), trigger),
        None => (pipeline, trigger),
    })
}

/// Pick the triggering event: `--event`, then the CI platform's variable,
/// then push. Blank values count as unset at every level.
fn resolve_event(explicit: Option<String>, platform: Option<String>) -> TriggerEvent {
    let present = |name: &String| !name.trim().is_empty();
    explicit
        .filter(present)
        .or_else(|| platform.filter(present))
        .map(TriggerEvent::from)
        .unwrap_or(TriggerEvent::Push)
}

/// Process exit codes are a byte; anything outside that range is a plain failure.
fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_resolve_event_precedence() {
        assert_eq!(
            resolve_event(Some("pull_request".into()), Some("push".into())),
            TriggerEvent::PullRequest
        );
        assert_eq!(
            resolve_event(None, Some("workflow_dispatch".into())),
            TriggerEvent::WorkflowDispatch
        );
        assert_eq!(resolve_event(None, None), TriggerEvent::Push);
        assert_eq!(resolve_event(Some("  ".into()), None), TriggerEvent::Push);
    }

    #[test]
    fn test_blank_event_falls_back_to_platform() {
        assert_eq!(
            resolve_event(Some("  ".into()), Some("workflow_dispatch".into())),
            TriggerEvent::WorkflowDispatch
        );
        assert_eq!(
            resolve_event(Some(String::new()), Some("pull_request".into())),
            TriggerEvent::PullRequest
        );
        assert_eq!(
            resolve_event(Some(String::new()), Some(" ".into())),
            TriggerEvent::Push
        );
    }

    #[test]
    fn test_exit_status_mapping() {
        assert_eq!(exit_status(0), 0);
        assert_eq!(exit_status(2), 2);
        assert_eq!(exit_status(127), 127);
        assert_eq!(exit_status(-1), 1);
        assert_eq!(exit_status(300), 1);
    }

    #[test]
    fn test_resolve_pipeline_builtin_when_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, trigger) = resolve_pipeline(Some(dir.path()), None).unwrap();
        assert_eq!(pipeline.stages().len(), 4);
        assert_eq!(pipeline.workspace(), dir.path());
        assert_eq!(trigger, Trigger::default());
    }

    #[test]
    fn test_resolve_pipeline_picks_up_workspace_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_DEFINITION_FILE),
            "on = [\"workflow_dispatch\"]\n[[stages]]\nname = \"hello\"\ncommand = [\"echo\", \"hi\"]\n",
        )
        .unwrap();

        let (pipeline, trigger) = resolve_pipeline(Some(dir.path()), None).unwrap();
        assert_eq!(pipeline.stage_names(), vec!["hello"]);
        assert!(!trigger.matches(&TriggerEvent::Push));
    }

    #[test]
    fn test_resolve_pipeline_invalid_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "stages = []").unwrap();

        let err = resolve_pipeline(None, Some(path.as_path())).unwrap_err();
        assert!(format!("{err:#}").contains("no stages"));
    }

    #[tokio::test]
    async fn test_cmd_run_skips_non_matching_event() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_DEFINITION_FILE),
            "[[stages]]\nname = \"boom\"\ncommand = [\"false\"]\n",
        )
        .unwrap();

        let code = cmd_run(
            Some(dir.path()),
            None,
            &TriggerEvent::PullRequest,
            ReportFormat::Text,
        )
        .await
        .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_cmd_run_surfaces_stage_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_DEFINITION_FILE),
            "[[stages]]\nname = \"three\"\ncommand = [\"sh\", \"-c\", \"exit 3\"]\n",
        )
        .unwrap();

        let code = cmd_run(Some(dir.path()), None, &TriggerEvent::Push, ReportFormat::Json)
            .await
            .unwrap();
        assert_eq!(code, 3);
    }
}
