//! Command-line construction for the PHP CLI.

use std::path::{Path, PathBuf};

use crate::config::ResolvedConfig;
use crate::error::RunnerError;
use crate::output::CaptureMode;

use super::scratch::ScratchFiles;

/// Prepended to the fragment so the interpreter reads it as a full program.
const PROGRAM_HEADER: &str = "<?php\n";

/// Interpreter flags, in order:
/// no ini files, report everything, plain-text diagnostics sent to stdout,
/// no output buffering.
pub const INTERPRETER_FLAGS: &[&str] = &[
    "-n",
    "-d error_reporting=-1",
    "-d html_errors=off",
    "-d display_errors=stdout",
    "-d output_buffering=false",
];

/// A command line ready for the shell, plus the scratch files it refers to.
#[derive(Debug, Clone)]
pub struct CommandLine {
    /// Exact text handed to the shell.
    pub line: String,
    pub code_file: PathBuf,
    /// Redirect target for stdout when captured `ToFile`.
    pub stdout_file: Option<PathBuf>,
    /// Redirect target for stderr when captured `ToFile`.
    pub stderr_file: Option<PathBuf>,
}

/// Write `code` to a scratch file and build the command that runs it.
///
/// `Piped`/`Piped` does not add a shell-level `2>&1`: each stream keeps its
/// own pipe and is read separately.
pub fn build(
    config: &ResolvedConfig,
    scratch: &mut ScratchFiles,
    code: &str,
    stdout: CaptureMode,
    stderr: CaptureMode,
) -> Result<CommandLine, RunnerError> {
    if !stdout.is_captured() && !stderr.is_captured() {
        return Err(RunnerError::Configuration(
            "No stdout/stderr will be received: both streams are discarded".into(),
        ));
    }

    let escaper = config.platform.escaper();
    let escape_path = |path: &Path| escaper.escape(&path.to_string_lossy());

    let program = format!("{PROGRAM_HEADER}{code}");
    let code_file = scratch.allocate(Some(program.as_bytes()))?;

    let mut line = escape_path(&config.interpreter);
    for flag in INTERPRETER_FLAGS {
        line.push(' ');
        line.push_str(flag);
    }
    line.push(' ');
    line.push_str(&escape_path(&code_file));

    let stdout_file = match stdout {
        CaptureMode::ToFile => {
            let path = scratch.allocate(None)?;
            line.push_str(" >");
            line.push_str(&escape_path(&path));
            Some(path)
        }
        CaptureMode::Discard | CaptureMode::Piped => None,
    };

    let stderr_file = match stderr {
        CaptureMode::ToFile => {
            let path = scratch.allocate(None)?;
            line.push_str(" 2>");
            line.push_str(&escape_path(&path));
            Some(path)
        }
        CaptureMode::Discard | CaptureMode::Piped => None,
    };

    Ok(CommandLine {
        line,
        code_file,
        stdout_file,
        stderr_file,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
