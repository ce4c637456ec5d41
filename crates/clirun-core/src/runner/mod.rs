//! Session orchestration.
//!
//! A call to [`Runner::run`] opens a [`Session`], which owns the scratch
//! files for that call. The flow is: build the command line, spawn the
//! child, drain piped streams, wait for exit, read back file captures and
//! shape the result. The session's scratch files are released on every exit
//! path before the result is returned.

pub mod assemble;
pub mod command;
pub mod escape;
pub mod launcher;
pub mod multiplex;
pub mod scratch;

use std::collections::BTreeMap;
use std::time::Instant;

use crate::config::{ResolvedConfig, RunnerConfig};
use crate::error::RunnerError;
use crate::output::{CaptureMode, RunOutput, Stream};

use self::scratch::ScratchFiles;

/// Bytes accumulated per captured stream.
#[derive(Debug, Default)]
pub struct Captured {
    streams: BTreeMap<Stream, Vec<u8>>,
}

impl Captured {
    /// Register `stream` as captured, even if it never produces bytes.
    pub fn declare(&mut self, stream: Stream) {
        self.streams.entry(stream).or_default();
    }

    pub fn append(&mut self, stream: Stream, bytes: &[u8]) {
        self.streams.entry(stream).or_default().extend_from_slice(bytes);
    }

    pub fn get(&self, stream: Stream) -> Option<&[u8]> {
        self.streams.get(&stream).map(Vec::as_slice)
    }

    pub fn into_streams(self) -> impl Iterator<Item = (Stream, Vec<u8>)> {
        self.streams.into_iter()
    }
}

/// Runs PHP code fragments, one child process per call.
///
/// Configuration is validated once in [`Runner::new`]. A runner can be
/// shared across threads; concurrent calls use disjoint scratch files.
#[derive(Debug, Clone)]
pub struct Runner {
    config: ResolvedConfig,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Result<Self, RunnerError> {
        let config = config.resolve()?;
        tracing::debug!(
            interpreter = %config.interpreter.display(),
            temp_dir = %config.temp_dir.display(),
            wait_timeout_ms = config.wait_timeout.as_millis() as u64,
            "Runner configured",
        );
        Ok(Self { config })
    }

    /// Build a runner from `TEST_PHP_EXECUTABLE` and friends.
    pub fn from_env() -> Result<Self, RunnerError> {
        Self::new(RunnerConfig::from_env()?)
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Execute `code` in a fresh interpreter and return its output.
    ///
    /// At least one of `stdout`/`stderr` must be captured, otherwise
    /// [`RunnerError::Configuration`] is returned before anything is spawned.
    pub fn run(
        &self,
        code: &str,
        stdout: CaptureMode,
        stderr: CaptureMode,
    ) -> Result<RunOutput, RunnerError> {
        let start = Instant::now();
        let mut session = Session::open(&self.config);
        let result = session.execute(code, stdout, stderr);
        session.close();

        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::info!(duration_ms, "Session completed"),
            Err(e) => tracing::info!(duration_ms, kind = ?e.kind(), "Session failed"),
        }
        result
    }

    /// [`run`](Self::run) with both streams piped.
    pub fn run_piped(&self, code: &str) -> Result<RunOutput, RunnerError> {
        self.run(code, CaptureMode::Piped, CaptureMode::Piped)
    }
}

/// One execution of a code fragment and the scratch files it owns.
struct Session<'a> {
    config: &'a ResolvedConfig,
    scratch: ScratchFiles,
}

impl<'a> Session<'a> {
    fn open(config: &'a ResolvedConfig) -> Self {
        Self {
            config,
            scratch: ScratchFiles::new(&config.temp_dir),
        }
    }

    fn execute(
        &mut self,
        code: &str,
        stdout: CaptureMode,
        stderr: CaptureMode,
    ) -> Result<RunOutput, RunnerError> {
        let command = command::build(self.config, &mut self.scratch, code, stdout, stderr)?;
        tracing::debug!(command = %command.line, ?stdout, ?stderr, "Running code fragment");

        let launched = launcher::spawn(self.config, &command.line, stdout, stderr)?;
        let mut child = launched.child;

        let mut captured = Captured::default();
        for (stream, mode) in [(Stream::Stdout, stdout), (Stream::Stderr, stderr)] {
            if mode.is_captured() {
                captured.declare(stream);
            }
        }

        if !launched.pipes.is_empty() {
            multiplex::drain(
                &mut child,
                launched.pipes,
                self.config.wait_timeout,
                &mut captured,
            )?;
        }

        let status = assemble::wait_for_exit(&mut child, self.config.wait_timeout)?;
        assemble::collect_files(&command, &mut captured)?;
        assemble::finish(status, captured, &command.line)
    }

    fn close(mut self) {
        self.scratch.release_all();
    }
}
