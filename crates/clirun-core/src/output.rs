//! Capture policies, stream names, and the consolidated run result.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::RunnerError;

/// How one output stream of the child is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// Not captured; the stream is connected to the null device.
    Discard,
    /// Read incrementally into memory through a pipe.
    #[default]
    Piped,
    /// Redirected to a scratch file and read back after exit.
    ToFile,
}

impl CaptureMode {
    /// Whether the stream's content is available to the caller.
    pub fn is_captured(self) -> bool {
        !matches!(self, Self::Discard)
    }
}

impl FromStr for CaptureMode {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discard" | "no" | "none" => Ok(Self::Discard),
            "piped" | "pipe" => Ok(Self::Piped),
            "file" | "tofile" | "to-file" => Ok(Self::ToFile),
            other => Err(RunnerError::Configuration(format!(
                "invalid capture mode '{other}' (expected discard, piped or file)"
            ))),
        }
    }
}

/// One of the child's output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful result of [`Runner::run`](crate::Runner::run).
///
/// `Text` holds either the empty string (nothing was written) or the single
/// non-empty stream in normalized form: trailing whitespace trimmed and
/// every line prefixed with `>`. `Streams` is used when both streams
/// produced output; its values are the raw captured text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RunOutput {
    Text(String),
    Streams(BTreeMap<Stream, String>),
}

impl RunOutput {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Streams(_) => None,
        }
    }

    /// Raw text of `stream` when the result carries both streams.
    pub fn stream(&self, stream: Stream) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::Streams(map) => map.get(&stream).map(String::as_str),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(text) if text.is_empty())
    }
}

impl fmt::Display for RunOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Streams(map) => {
                let mut first = true;
                for (stream, text) in map {
                    if !first {
                        writeln!(f)?;
                    }
                    first = false;
                    write!(f, "{stream}:\n{text}")?;
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
