mod cli;
mod console;

use anyhow::Context as _;
use clap::Parser;
use cli::{Cli, Command, ReplayArgs};
use console::ConsoleSink;
use cutline_core::{EngineConfig, OperationSpec};
use cutline_engine::{compile, ProcessSupervisor, RunController, RunResult};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exit status for a run stopped by Ctrl-C.
const EXIT_CANCELLED: u8 = 130;

/// Stands in for the concat list in `--dry-run` output; no file is written.
const DRY_RUN_LIST: &str = "<concat-list>";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let engine = engine_config(&cli)?.resolve();
    tracing::debug!(engine = %engine.display(), "resolved ffmpeg");
    let supervisor = ProcessSupervisor::new(engine);

    let (spec, input, output) = match cli.cmd {
        Command::Check => return cmd_check(&supervisor).await,
        Command::Replay(args) => load_replay(args)?,
        cmd => {
            let (mode, fields) = cmd
                .into_request()
                .context("subcommand is not an edit operation")?;
            let input = fields.input_path().context("specify an input file")?;
            let output = fields.output_path().context("specify an output file")?;
            let spec = fields
                .to_spec(mode)
                .with_context(|| format!("invalid {mode} options"))?;
            (spec, input, output)
        }
    };

    if cli.dry_run {
        return dry_run(spec, &input, &output, supervisor.engine());
    }

    let controller = RunController::new(supervisor);
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let controller = controller.clone();
        let interrupted = interrupted.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupted.store(true, Ordering::SeqCst);
                controller.cancel();
            }
        });
    }

    let mut sink = ConsoleSink::new(std::io::stdout());
    let result = controller
        .run_spec(spec, &input, &output, &mut sink)
        .await
        .context("run failed")?;
    Ok(ExitCode::from(exit_code(&result, interrupted.load(Ordering::SeqCst))))
}

fn engine_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(path) = &cli.ffmpeg {
        config.ffmpeg_path = Some(path.clone());
    }
    Ok(config)
}

async fn cmd_check(supervisor: &ProcessSupervisor) -> anyhow::Result<ExitCode> {
    let version = supervisor.check_engine().await?;
    println!("{version}");
    Ok(ExitCode::SUCCESS)
}

fn load_replay(args: ReplayArgs) -> anyhow::Result<(OperationSpec, PathBuf, PathBuf)> {
    let data = std::fs::read_to_string(&args.spec)
        .with_context(|| format!("read '{}'", args.spec.display()))?;
    let spec: OperationSpec = serde_json::from_str(&data)
        .with_context(|| format!("parse operation in '{}'", args.spec.display()))?;
    Ok((spec, PathBuf::from(args.io.input), PathBuf::from(args.io.output)))
}

fn dry_run(
    spec: OperationSpec,
    input: &Path,
    output: &Path,
    engine: &Path,
) -> anyhow::Result<ExitCode> {
    let spec = if spec.needs_list_file() {
        spec.with_list_file(DRY_RUN_LIST)
    } else {
        spec
    };
    let invocation = compile(&spec, input, output, engine)?;
    println!("{invocation}");
    Ok(ExitCode::SUCCESS)
}

fn exit_code(result: &RunResult, interrupted: bool) -> u8 {
    if result.success() {
        0
    } else if result.is_cancelled() || interrupted {
        // The terminal may deliver SIGINT to ffmpeg before our cancel lands.
        EXIT_CANCELLED
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutline_engine::RunOutcome;
    use std::time::Duration;

    #[test]
    fn exit_codes_follow_outcome() {
        let ok = RunResult::new(RunOutcome::Succeeded, Duration::ZERO);
        let failed = RunResult::new(RunOutcome::Failed { code: Some(1) }, Duration::ZERO);
        let killed = RunResult::new(RunOutcome::Failed { code: None }, Duration::ZERO);
        let cancelled = RunResult::new(RunOutcome::Cancelled, Duration::ZERO);

        assert_eq!(exit_code(&ok, false), 0);
        assert_eq!(exit_code(&failed, false), 1);
        assert_eq!(exit_code(&killed, false), 1);
        assert_eq!(exit_code(&cancelled, false), EXIT_CANCELLED);
        assert_eq!(exit_code(&killed, true), EXIT_CANCELLED);
    }

    #[test]
    fn ffmpeg_flag_overrides_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cutline.json");
        EngineConfig::with_ffmpeg_path("/from/config").save_to_file(&path).unwrap();

        let cli = Cli::parse_from([
            "cutline",
            "--config",
            path.to_str().unwrap(),
            "--ffmpeg",
            "/from/flag",
            "check",
        ]);
        let config = engine_config(&cli).unwrap();
        assert_eq!(config.ffmpeg_path, Some(PathBuf::from("/from/flag")));

        let cli = Cli::parse_from(["cutline", "--config", path.to_str().unwrap(), "check"]);
        let config = engine_config(&cli).unwrap();
        assert_eq!(config.ffmpeg_path, Some(PathBuf::from("/from/config")));
    }

    #[test]
    fn replay_reads_operation_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("op.json");
        std::fs::write(&path, r#"{"Speed": {"factor": 0.25, "adjust_audio": true}}"#).unwrap();

        let cli = Cli::parse_from([
            "cutline",
            "replay",
            "-i",
            "in.mp4",
            "-o",
            "out.mp4",
            path.to_str().unwrap(),
        ]);
        let Command::Replay(args) = cli.cmd else {
            panic!("expected replay");
        };
        let (spec, input, output) = load_replay(args).unwrap();
        assert_eq!(
            spec,
            OperationSpec::Speed {
                factor: 0.25,
                adjust_audio: true
            }
        );
        assert_eq!(input, PathBuf::from("in.mp4"));
        assert_eq!(output, PathBuf::from("out.mp4"));
    }

    #[test]
    fn dry_run_compiles_concat_without_writing_a_list() {
        let spec = OperationSpec::Concat {
            second_input: PathBuf::from("b.mp4"),
            list_file: None,
        };
        assert!(dry_run(spec, Path::new("a.mp4"), Path::new("c.mp4"), Path::new("ffmpeg")).is_ok());

        let spec = OperationSpec::Concat {
            second_input: PathBuf::new(),
            list_file: None,
        };
        assert!(dry_run(spec, Path::new("a.mp4"), Path::new("c.mp4"), Path::new("ffmpeg")).is_err());
    }
}
