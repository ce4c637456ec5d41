use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::RunnerError;
use crate::runner::escape::{Escape, PosixEscape, WindowsQuote};

/// Environment variable naming the PHP CLI binary.
pub const INTERPRETER_ENV: &str = "TEST_PHP_EXECUTABLE";

/// Environment variable overriding the scratch directory.
pub const TEMP_DIR_ENV: &str = "CLIRUN_TEMP_DIR";

/// Environment variable overriding the readiness-wait bound, in seconds.
pub const WAIT_TIMEOUT_ENV: &str = "CLIRUN_WAIT_TIMEOUT_SECS";

/// Default bound on a single readiness wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shell family the command line is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Posix,
    Windows,
}

impl Platform {
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    /// Quoting strategy for file-name tokens.
    pub fn escaper(self) -> &'static dyn Escape {
        match self {
            Self::Posix => &PosixEscape,
            Self::Windows => &WindowsQuote,
        }
    }

    /// Shell program and the flag that makes it run a command string.
    pub fn shell(self) -> (&'static str, &'static str) {
        match self {
            Self::Posix => ("/bin/sh", "-c"),
            Self::Windows => ("cmd", "/C"),
        }
    }
}

/// Unvalidated runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Scratch directory (host temp dir when `None`).
    pub temp_dir: Option<PathBuf>,
    /// PHP CLI binary (`TEST_PHP_EXECUTABLE` when `None`).
    pub interpreter: Option<PathBuf>,
    pub platform: Platform,
    /// Bound on each readiness wait and on the final process wait.
    pub wait_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            interpreter: None,
            platform: Platform::host(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default            |
    /// |----------------------------|--------------------|
    /// | `TEST_PHP_EXECUTABLE`      | (required)         |
    /// | `CLIRUN_TEMP_DIR`          | host temp dir      |
    /// | `CLIRUN_WAIT_TIMEOUT_SECS` | `30`               |
    pub fn from_env() -> Result<Self, RunnerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RunnerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let wait_timeout = match non_empty(WAIT_TIMEOUT_ENV) {
            Some(raw) => {
                let secs: f64 = raw.trim().parse().map_err(|_| {
                    RunnerError::Configuration(format!(
                        "{WAIT_TIMEOUT_ENV} must be a number of seconds, got '{raw}'"
                    ))
                })?;
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(RunnerError::Configuration(format!(
                        "{WAIT_TIMEOUT_ENV} must be positive, got '{raw}'"
                    )));
                }
                Duration::from_secs_f64(secs)
            }
            None => DEFAULT_WAIT_TIMEOUT,
        };

        Ok(Self {
            temp_dir: non_empty(TEMP_DIR_ENV).map(PathBuf::from),
            interpreter: non_empty(INTERPRETER_ENV).map(PathBuf::from),
            platform: Platform::host(),
            wait_timeout,
        })
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_interpreter(mut self, path: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(path.into());
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Validate and canonicalize. Called once when a runner is built.
    ///
    /// A missing interpreter falls back to `TEST_PHP_EXECUTABLE` here, so
    /// no environment lookup happens while a session runs.
    pub fn resolve(self) -> Result<ResolvedConfig, RunnerError> {
        if self.wait_timeout.is_zero() {
            return Err(RunnerError::Configuration(
                "wait timeout must be greater than zero".into(),
            ));
        }

        let temp_dir = resolve_temp_dir(self.temp_dir.unwrap_or_else(std::env::temp_dir))?;

        let interpreter = self
            .interpreter
            .or_else(|| std::env::var_os(INTERPRETER_ENV).map(PathBuf::from))
            .ok_or_else(|| {
                RunnerError::Environment(format!(
                    "The PHP executable can't be found ({INTERPRETER_ENV} is not set)"
                ))
            })?;
        let interpreter = resolve_interpreter(&interpreter)?;

        Ok(ResolvedConfig {
            temp_dir,
            interpreter,
            platform: self.platform,
            wait_timeout: self.wait_timeout,
        })
    }
}

/// Validated configuration shared by every session of a runner.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Canonical, writable scratch directory.
    pub temp_dir: PathBuf,
    /// Canonical path of the PHP CLI binary.
    pub interpreter: PathBuf,
    pub platform: Platform,
    pub wait_timeout: Duration,
}

fn resolve_temp_dir(dir: PathBuf) -> Result<PathBuf, RunnerError> {
    let dir = dir.canonicalize().map_err(|e| {
        RunnerError::Environment(format!(
            "Failed to retrieve the temporary directory {}: {e}",
            dir.display()
        ))
    })?;
    if !dir.is_dir() {
        return Err(RunnerError::Environment(format!(
            "The temporary directory {} is not a directory",
            dir.display()
        )));
    }
    if !is_writable(&dir) {
        return Err(RunnerError::Environment(format!(
            "The temporary directory {} is not writable",
            dir.display()
        )));
    }
    Ok(dir)
}

fn resolve_interpreter(path: &Path) -> Result<PathBuf, RunnerError> {
    let resolved = path.canonicalize().map_err(|e| {
        RunnerError::Environment(format!(
            "The PHP executable can't be found at {}: {e}",
            path.display()
        ))
    })?;
    if !resolved.is_file() {
        return Err(RunnerError::Environment(format!(
            "The PHP executable {} is not a regular file",
            resolved.display()
        )));
    }
    Ok(resolved)
}

fn is_writable(path: &Path) -> bool {
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call.
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
