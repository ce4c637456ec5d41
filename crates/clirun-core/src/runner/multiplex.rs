//! Single-threaded draining of piped output streams.
//!
//! Uses `poll()` over the open pipes. Each wait cycle is bounded by the
//! configured wait timeout; a cycle in which no pipe becomes ready means the
//! child is presumed hung and is killed. Every ready pipe is read once per
//! cycle (up to [`READ_CHUNK_SIZE`] bytes) and a zero-byte read closes it.
//!
//! Ordering: bytes within one stream keep their exact order. No relative
//! ordering between stdout and stderr is recorded.

use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::process::Child;
use std::time::Duration;

use crate::error::RunnerError;

use super::launcher::{self, PipeReader};
use super::Captured;

pub const READ_CHUNK_SIZE: usize = 8192;

/// Read every pipe to end-of-stream, appending into `captured`.
///
/// A failing `poll()` call ends the loop without error; whatever was read so
/// far is kept.
pub fn drain(
    child: &mut Child,
    mut open: Vec<PipeReader>,
    timeout: Duration,
    captured: &mut Captured,
) -> Result<(), RunnerError> {
    let timeout_ms = poll_timeout_ms(timeout);
    let mut buf = [0u8; READ_CHUNK_SIZE];

    while !open.is_empty() {
        let mut fds: Vec<libc::pollfd> = open
            .iter()
            .map(|pipe| libc::pollfd {
                fd: pipe.file.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        // SAFETY: `fds` is a live, correctly sized array of pollfd structs.
        let ready =
            unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };

        if ready < 0 {
            let err = io::Error::last_os_error();
            tracing::debug!(error = %err, "Readiness wait failed, treating streams as drained");
            break;
        }
        if ready == 0 {
            tracing::warn!(timeout_ms, "No output within wait timeout, killing child");
            launcher::kill(child);
            return Err(RunnerError::Timeout { timeout });
        }

        let mut finished = Vec::new();
        for (idx, pfd) in fds.iter().enumerate() {
            if pfd.revents == 0 {
                continue;
            }
            let pipe = &mut open[idx];
            match pipe.file.read(&mut buf) {
                Ok(0) => {
                    tracing::debug!(stream = %pipe.stream, "End of stream");
                    finished.push(idx);
                }
                Ok(n) => captured.append(pipe.stream, &buf[..n]),
                // Spurious readiness.
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) => {}
                Err(source) => {
                    let stream = pipe.stream;
                    launcher::kill(child);
                    return Err(RunnerError::StreamRead { stream, source });
                }
            }
        }
        for idx in finished.into_iter().rev() {
            open.remove(idx);
        }
    }

    Ok(())
}

/// `poll()` timeout in whole milliseconds, rounded up so a sub-millisecond
/// bound still waits instead of returning at once.
fn poll_timeout_ms(timeout: Duration) -> libc::c_int {
    let ms = timeout.as_micros().div_ceil(1000).max(1);
    ms.min(libc::c_int::MAX as u128) as libc::c_int
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
