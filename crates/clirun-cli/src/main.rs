//! `clirun` -- run a PHP code fragment in a fresh interpreter process.
//!
//! Reads the fragment (without the `<?php` opener) from a file or stdin,
//! runs it through [`clirun_core::Runner`] and prints the normalized output.
//!
//! # Environment variables
//!
//! | Variable                   | Required | Default       | Description                    |
//! |----------------------------|----------|---------------|--------------------------------|
//! | `TEST_PHP_EXECUTABLE`      | yes      | --            | PHP CLI binary                 |
//! | `CLIRUN_TEMP_DIR`          | no       | host temp dir | Scratch directory              |
//! | `CLIRUN_WAIT_TIMEOUT_SECS` | no       | `30`          | Bound on each readiness wait   |
//!
//! Exit status: `0` on success, the child's exit code when it failed, `2`
//! for configuration or environment problems, `1` for anything else.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use clirun_core::{CaptureMode, ErrorKind, RunOutput, Runner, RunnerConfig, RunnerError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log filter used when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "clirun=info,clirun_core=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Capture {
    Piped,
    File,
    Discard,
}

impl From<Capture> for CaptureMode {
    fn from(value: Capture) -> Self {
        match value {
            Capture::Piped => CaptureMode::Piped,
            Capture::File => CaptureMode::ToFile,
            Capture::Discard => CaptureMode::Discard,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "clirun", version, about = "Run a PHP code fragment in a fresh interpreter")]
struct Args {
    /// File holding the code fragment, or `-` for stdin.
    #[arg(default_value = "-")]
    input: String,

    /// How to capture the child's stdout.
    #[arg(long, value_enum, default_value_t = Capture::Piped)]
    stdout: Capture,

    /// How to capture the child's stderr.
    #[arg(long, value_enum, default_value_t = Capture::Piped)]
    stderr: Capture,

    /// PHP CLI binary (overrides TEST_PHP_EXECUTABLE).
    #[arg(long)]
    php: Option<PathBuf>,

    /// Scratch directory (overrides CLIRUN_TEMP_DIR).
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// Bound on each readiness wait, in seconds (overrides CLIRUN_WAIT_TIMEOUT_SECS).
    #[arg(long)]
    timeout_secs: Option<f64>,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

impl Args {
    fn config(&self) -> Result<RunnerConfig, RunnerError> {
        let mut config = RunnerConfig::from_env()?;
        if let Some(php) = &self.php {
            config = config.with_interpreter(php);
        }
        if let Some(dir) = &self.temp_dir {
            config = config.with_temp_dir(dir);
        }
        if let Some(secs) = self.timeout_secs {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(RunnerError::Configuration(format!(
                    "--timeout-secs must be positive, got {secs}"
                )));
            }
            config = config.with_wait_timeout(Duration::from_secs_f64(secs));
        }
        Ok(config)
    }

    fn read_code(&self) -> anyhow::Result<String> {
        if self.input == "-" {
            let mut code = String::new();
            std::io::stdin()
                .read_to_string(&mut code)
                .context("Failed to read code from stdin")?;
            Ok(code)
        } else {
            std::fs::read_to_string(&self.input)
                .with_context(|| format!("Failed to read code from {}", self.input))
        }
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match execute(&args) {
        Ok(output) => {
            if args.json {
                match serde_json::to_string_pretty(&output) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize result");
                        return ExitCode::FAILURE;
                    }
                }
            } else if !output.is_empty() {
                println!("{output}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

fn execute(args: &Args) -> anyhow::Result<RunOutput> {
    let code = args.read_code()?;
    let runner = Runner::new(args.config()?)?;
    tracing::info!(
        interpreter = %runner.config().interpreter.display(),
        stdout = ?args.stdout,
        stderr = ?args.stderr,
        "Running code fragment",
    );
    let output = runner.run(&code, args.stdout.into(), args.stderr.into())?;
    Ok(output)
}

/// Map a failure to the process exit status.
fn exit_status(err: &anyhow::Error) -> u8 {
    let Some(err) = err.downcast_ref::<RunnerError>() else {
        return 1;
    };
    match err {
        RunnerError::Process(failure) => u8::try_from(failure.exit_code)
            .ok()
            .filter(|code| *code != 0)
            .unwrap_or(1),
        _ => match err.kind() {
            ErrorKind::Configuration | ErrorKind::Environment => 2,
            _ => 1,
        },
    }
}
