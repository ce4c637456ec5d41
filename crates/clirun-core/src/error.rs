//! Errors raised by a runner session.
//!
//! Every variant is terminal for the call that produced it. Scratch files
//! are already removed by the time a caller sees one of these.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::output::Stream;

/// Coarse classification of a [`RunnerError`], convenient for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Environment,
    Configuration,
    TempFile,
    Spawn,
    Timeout,
    StreamRead,
    Wait,
    FileCapture,
    Process,
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The temp directory or interpreter could not be resolved at construction.
    #[error("Environment error: {0}")]
    Environment(String),

    /// The requested capture modes (or a mode name) are unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to create a temporary file at {}", path.display())]
    TempFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to start process for command: {command}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// No piped stream became readable (or the process did not exit)
    /// within one wait cycle. The child has been killed.
    #[error("Process timed out after {}ms", timeout.as_millis())]
    Timeout { timeout: Duration },

    #[error("Failed to read from process {stream}")]
    StreamRead {
        stream: Stream,
        #[source]
        source: io::Error,
    },

    #[error("Failed to wait for the process to terminate")]
    Wait(#[source] io::Error),

    #[error("Failed to read file containing redirected {stream} ({})", path.display())]
    FileCapture {
        stream: Stream,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The interpreter exited with a non-zero status.
    #[error("{0}")]
    Process(ProcessFailure),
}

impl RunnerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Environment(_) => ErrorKind::Environment,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::TempFile { .. } => ErrorKind::TempFile,
            Self::Spawn { .. } => ErrorKind::Spawn,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::StreamRead { .. } => ErrorKind::StreamRead,
            Self::Wait(_) => ErrorKind::Wait,
            Self::FileCapture { .. } => ErrorKind::FileCapture,
            Self::Process(_) => ErrorKind::Process,
        }
    }
}

/// Diagnostic context for a process that exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFailure {
    /// Exit code, or `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    /// Terminating signal, if any.
    pub signal: Option<i32>,
    /// Captured stdout, only when non-empty.
    pub stdout: Option<String>,
    /// Captured stderr, only when non-empty.
    pub stderr: Option<String>,
    /// The command line exactly as handed to the shell.
    pub command: String,
}

impl fmt::Display for ProcessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Process failed with return code {}", self.exit_code)?;
        if let Some(stdout) = &self.stdout {
            write!(f, "\nstdout: {stdout}")?;
        }
        if let Some(stderr) = &self.stderr {
            write!(f, "\nstderr: {stderr}")?;
        }
        write!(f, "\n\nCommand line executed:\n{}", self.command)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
