//! Shared fixtures for runner integration tests.
//!
//! The stand-in interpreter accepts the PHP flags, drops the `<?php` header
//! line of the program file and executes the rest with `sh`, so fragments in
//! these tests are shell code.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use clirun_core::{Runner, RunnerConfig};
use tempfile::TempDir;

const SHELL_INTERPRETER: &str = "#!/bin/sh\n\
for last do :; done\n\
exec /bin/sh -c \"$(sed 1d \"$last\")\"\n";

const ARGS_INTERPRETER: &str = "#!/bin/sh\nprintf '%s\\n' \"$@\"\n";

struct Interpreters {
    _dir: TempDir,
    shell: PathBuf,
    args: PathBuf,
}

fn interpreters() -> &'static Interpreters {
    static CELL: OnceLock<Interpreters> = OnceLock::new();
    CELL.get_or_init(|| {
        let dir = tempfile::tempdir().expect("create interpreter dir");
        let shell = write_script(dir.path(), "php-sh", SHELL_INTERPRETER);
        let args = write_script(dir.path(), "php-args", ARGS_INTERPRETER);
        Interpreters {
            _dir: dir,
            shell,
            args,
        }
    })
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let staging = dir.join(format!(".{name}.tmp"));
    fs::write(&staging, body).expect("write interpreter script");
    fs::set_permissions(&staging, fs::Permissions::from_mode(0o755)).expect("chmod");
    let path = dir.join(name);
    fs::rename(&staging, &path).expect("move interpreter script");
    path
}

/// Interpreter that runs the fragment as shell code.
pub fn shell_interpreter() -> &'static Path {
    &interpreters().shell
}

/// Interpreter that prints each argument it receives on its own line.
pub fn args_interpreter() -> &'static Path {
    &interpreters().args
}

pub fn runner(scratch: &Path) -> Runner {
    runner_with_timeout(scratch, Duration::from_secs(10))
}

pub fn runner_with_timeout(scratch: &Path, timeout: Duration) -> Runner {
    Runner::new(
        RunnerConfig::default()
            .with_temp_dir(scratch)
            .with_interpreter(shell_interpreter())
            .with_wait_timeout(timeout),
    )
    .expect("build runner")
}

/// Scratch files still present in `dir`.
pub fn leftover_scratch_files(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .expect("read scratch dir")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("clirunner-temp"))
        })
        .collect()
}
