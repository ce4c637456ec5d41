//! Run PHP code fragments in a fresh interpreter process.
//!
//! [`Runner`] writes a fragment to a scratch file, launches the PHP CLI with
//! flags that make diagnostics deterministic and unbuffered, captures stdout
//! and stderr according to a [`CaptureMode`] per stream, and returns either
//! the normalized output or a [`RunnerError`]. Scratch files never outlive
//! the call.

pub mod config;
pub mod error;
pub mod output;
pub mod runner;

pub use config::{Platform, ResolvedConfig, RunnerConfig};
pub use error::{ErrorKind, ProcessFailure, RunnerError};
pub use output::{CaptureMode, RunOutput, Stream};
pub use runner::Runner;
