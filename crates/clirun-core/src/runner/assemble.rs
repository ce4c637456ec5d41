//! Exit-status collection and result normalization.

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{ProcessFailure, RunnerError};
use crate::output::{RunOutput, Stream};

use super::command::CommandLine;
use super::launcher;
use super::Captured;

/// Interval between exit checks while waiting for the child.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Wait for the child to exit, killing it if it outlives `timeout`.
pub fn wait_for_exit(child: &mut Child, timeout: Duration) -> Result<ExitStatus, RunnerError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                tracing::warn!(pid = child.id(), "Process did not exit within wait timeout");
                launcher::kill(child);
                return Err(RunnerError::Timeout { timeout });
            }
            Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
            Err(source) => {
                launcher::kill(child);
                return Err(RunnerError::Wait(source));
            }
        }
    }
}

/// Read back every stream that was redirected to a scratch file.
pub fn collect_files(command: &CommandLine, captured: &mut Captured) -> Result<(), RunnerError> {
    let targets = [
        (Stream::Stdout, command.stdout_file.as_ref()),
        (Stream::Stderr, command.stderr_file.as_ref()),
    ];
    for (stream, path) in targets {
        let Some(path) = path else { continue };
        let bytes = fs::read(path).map_err(|source| RunnerError::FileCapture {
            stream,
            path: path.clone(),
            source,
        })?;
        captured.append(stream, &bytes);
    }
    Ok(())
}

/// Classify the exit status and shape the captured streams into a result.
pub fn finish(
    status: ExitStatus,
    captured: Captured,
    command: &str,
) -> Result<RunOutput, RunnerError> {
    let mut streams: BTreeMap<Stream, String> = captured
        .into_streams()
        .map(|(stream, bytes)| (stream, String::from_utf8_lossy(&bytes).into_owned()))
        .filter(|(_, text)| !text.is_empty())
        .collect();

    if !status.success() {
        return Err(RunnerError::Process(ProcessFailure {
            exit_code: status.code().unwrap_or(-1),
            signal: status.signal(),
            stdout: streams.remove(&Stream::Stdout),
            stderr: streams.remove(&Stream::Stderr),
            command: command.to_string(),
        }));
    }

    Ok(match streams.len() {
        0 => RunOutput::Text(String::new()),
        1 => {
            let text = streams.into_values().next().unwrap_or_default();
            RunOutput::Text(normalize(&text))
        }
        _ => RunOutput::Streams(streams),
    })
}

/// Trim trailing whitespace, unify line endings, and mark every line with `>`.
pub fn normalize(text: &str) -> String {
    let trimmed = text.trim_end_matches(&[' ', '\t', '\n', '\r', '\0', '\x0B'][..]);
    let mut out = String::with_capacity(trimmed.len() + 8);
    out.push('>');
    out.push_str(&trimmed.replace("\r\n", "\n").replace('\n', "\n>"));
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
