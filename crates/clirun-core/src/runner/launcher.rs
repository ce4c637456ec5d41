//! Child-process spawning.
//!
//! The command line runs under the platform shell so that the redirections
//! written by the command builder take effect. On POSIX the line is prefixed
//! with `exec`, which makes the interpreter itself the direct child: killing
//! the child kills PHP, not an intermediate shell.

use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::process::{Child, Command, Stdio};

use crate::config::{Platform, ResolvedConfig};
use crate::error::RunnerError;
use crate::output::{CaptureMode, Stream};

/// Read end of a piped output stream.
#[derive(Debug)]
pub struct PipeReader {
    pub stream: Stream,
    pub file: File,
}

/// A running child and the pipes that were opened for it.
#[derive(Debug)]
pub struct Launched {
    pub child: Child,
    /// Piped streams in stdout, stderr order. Empty when nothing is piped.
    pub pipes: Vec<PipeReader>,
}

pub fn spawn(
    config: &ResolvedConfig,
    line: &str,
    stdout: CaptureMode,
    stderr: CaptureMode,
) -> Result<Launched, RunnerError> {
    let (shell, flag) = config.platform.shell();
    let shell_line = match config.platform {
        Platform::Posix => format!("exec {line}"),
        Platform::Windows => line.to_string(),
    };

    let mut child = Command::new(shell)
        .arg(flag)
        .arg(&shell_line)
        .stdin(Stdio::piped())
        .stdout(stdio_for(stdout))
        .stderr(stdio_for(stderr))
        .spawn()
        .map_err(|source| RunnerError::Spawn {
            command: line.to_string(),
            source,
        })?;

    // The child never receives input.
    drop(child.stdin.take());

    let mut pipes = Vec::with_capacity(2);
    if let Some(out) = child.stdout.take() {
        pipes.push(PipeReader {
            stream: Stream::Stdout,
            file: File::from(OwnedFd::from(out)),
        });
    }
    if let Some(err) = child.stderr.take() {
        pipes.push(PipeReader {
            stream: Stream::Stderr,
            file: File::from(OwnedFd::from(err)),
        });
    }

    for pipe in &pipes {
        if let Err(source) = set_nonblocking(pipe.file.as_raw_fd()) {
            kill(&mut child);
            return Err(RunnerError::Spawn {
                command: line.to_string(),
                source,
            });
        }
    }

    tracing::debug!(pid = child.id(), piped = pipes.len(), "Spawned interpreter");
    Ok(Launched { child, pipes })
}

/// SIGKILL the child and reap it. Errors are logged, never raised.
pub fn kill(child: &mut Child) {
    let pid = child.id();
    if let Err(e) = child.kill() {
        tracing::warn!(pid, error = %e, "Failed to kill child process");
    }
    match child.wait() {
        Ok(status) => tracing::warn!(pid, %status, "Killed child process"),
        Err(e) => tracing::warn!(pid, error = %e, "Failed to reap killed child process"),
    }
}

fn stdio_for(mode: CaptureMode) -> Stdio {
    match mode {
        CaptureMode::Piped => Stdio::piped(),
        // `ToFile` is redirected by the shell; its inherited handle is unused.
        CaptureMode::Discard | CaptureMode::ToFile => Stdio::null(),
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: `fd` is an open descriptor owned by the caller for the duration of the call.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
