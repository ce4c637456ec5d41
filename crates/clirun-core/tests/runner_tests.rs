//! End-to-end tests for [`Runner::run`] against a stand-in interpreter.

mod common;

use std::fs;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use clirun_core::{CaptureMode, ErrorKind, RunOutput, Runner, RunnerConfig, RunnerError, Stream};

use common::{args_interpreter, leftover_scratch_files, runner, runner_with_timeout};

use CaptureMode::{Discard, Piped, ToFile};

// ---------------------------------------------------------------------------
// Successful runs
// ---------------------------------------------------------------------------

#[test]
fn hello_with_both_streams_piped() {
    let dir = tempfile::tempdir().unwrap();
    let out = runner(dir.path()).run("echo hello", Piped, Piped).unwrap();
    assert_eq!(out, RunOutput::Text(">hello".into()));
}

#[test]
fn stdout_only_run_leaves_no_scratch_files() {
    let dir = tempfile::tempdir().unwrap();
    let out = runner(dir.path())
        .run("printf 'one\\ntwo\\r\\nthree\\n\\n'", Piped, Piped)
        .unwrap();
    assert_eq!(out, RunOutput::Text(">one\n>two\n>three".into()));
    assert!(leftover_scratch_files(dir.path()).is_empty());
}

#[test]
fn both_streams_form_a_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let out = runner(dir.path())
        .run("echo out; echo err >&2", Piped, Piped)
        .unwrap();
    assert_eq!(out.stream(Stream::Stdout), Some("out\n"));
    assert_eq!(out.stream(Stream::Stderr), Some("err\n"));
}

#[test]
fn empty_stream_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let out = runner(dir.path())
        .run("printf '' >&2; echo only", Piped, Piped)
        .unwrap();
    assert_eq!(out, RunOutput::Text(">only".into()));
}

#[test]
fn silent_program_yields_empty_text() {
    let dir = tempfile::tempdir().unwrap();
    let out = runner(dir.path()).run("true", Piped, Piped).unwrap();
    assert!(out.is_empty());
}

#[test]
fn child_sees_closed_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let out = runner(dir.path()).run("cat; echo done", Piped, Discard).unwrap();
    assert_eq!(out, RunOutput::Text(">done".into()));
}

#[test]
fn file_capture_for_both_streams() {
    let dir = tempfile::tempdir().unwrap();
    let out = runner(dir.path())
        .run("echo out; echo err >&2", ToFile, ToFile)
        .unwrap();
    assert_eq!(out.stream(Stream::Stdout), Some("out\n"));
    assert_eq!(out.stream(Stream::Stderr), Some("err\n"));
    assert!(leftover_scratch_files(dir.path()).is_empty());
}

#[test]
fn discarded_stream_is_not_observed() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(dir.path());

    let out = runner.run("echo out; echo err >&2", Discard, Piped).unwrap();
    assert_eq!(out, RunOutput::Text(">err".into()));

    let out = runner.run("echo out; echo err >&2", ToFile, Discard).unwrap();
    assert_eq!(out, RunOutput::Text(">out".into()));
}

#[test]
fn mixed_pipe_and_file_capture() {
    let dir = tempfile::tempdir().unwrap();
    let out = runner(dir.path())
        .run("echo out; echo err >&2", Piped, ToFile)
        .unwrap();
    assert_eq!(out.stream(Stream::Stdout), Some("out\n"));
    assert_eq!(out.stream(Stream::Stderr), Some("err\n"));
}

#[test]
fn output_spanning_many_chunks_is_complete() {
    let dir = tempfile::tempdir().unwrap();
    let out = runner(dir.path())
        .run(
            "i=0; while [ $i -lt 2000 ]; do echo line$i; echo err$i >&2; i=$((i+1)); done",
            Piped,
            Piped,
        )
        .unwrap();
    let stdout = out.stream(Stream::Stdout).unwrap();
    let stderr = out.stream(Stream::Stderr).unwrap();
    assert_eq!(stdout.lines().count(), 2000);
    assert_eq!(stderr.lines().count(), 2000);
    assert!(stdout.starts_with("line0\nline1\n"));
    assert!(stdout.ends_with("line1999\n"));
    assert!(stderr.ends_with("err1999\n"));
}

#[test]
fn repeated_runs_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(dir.path());
    let code = "echo alpha; echo beta >&2";
    let first = runner.run(code, Piped, Piped).unwrap();
    for _ in 0..3 {
        assert_eq!(runner.run(code, Piped, Piped).unwrap(), first);
    }
}

#[test]
fn concurrent_sessions_share_a_directory_safely() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(dir.path());

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let runner = &runner;
                scope.spawn(move || {
                    let out = runner
                        .run(&format!("echo session{n}"), ToFile, Piped)
                        .unwrap();
                    (n, out)
                })
            })
            .collect();
        for handle in handles {
            let (n, out) = handle.join().unwrap();
            assert_eq!(out, RunOutput::Text(format!(">session{n}")));
        }
    });

    assert!(leftover_scratch_files(dir.path()).is_empty());
}

#[test]
fn paths_with_spaces_and_quotes_are_escaped() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("it's a scratch dir");
    fs::create_dir(&dir).unwrap();

    let out = runner(&dir).run("echo ok >&2", Discard, ToFile).unwrap();
    assert_eq!(out, RunOutput::Text(">ok".into()));
    assert!(leftover_scratch_files(&dir).is_empty());
}

#[test]
fn interpreter_receives_fixed_flags_then_program() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Runner::new(
        RunnerConfig::default()
            .with_temp_dir(dir.path())
            .with_interpreter(args_interpreter()),
    )
    .unwrap();

    let out = runner.run("echo 1;", Piped, Piped).unwrap();
    let program = runner.config().temp_dir.join("clirunner-temp1.php");
    // The shell splits each `-d key=value` flag into two arguments.
    let expected = format!(
        ">-n\n>-d\n>error_reporting=-1\n>-d\n>html_errors=off\n\
         >-d\n>display_errors=stdout\n>-d\n>output_buffering=false\n>{}",
        program.display()
    );
    assert_eq!(out, RunOutput::Text(expected));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn both_discarded_is_rejected_without_spawning() {
    let dir = tempfile::tempdir().unwrap();
    let err = runner(dir.path())
        .run("touch spawned; echo never", Discard, Discard)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn non_zero_exit_reports_code_output_and_command() {
    let dir = tempfile::tempdir().unwrap();
    let err = runner(dir.path())
        .run("echo partial; echo oops >&2; exit 3", Piped, Piped)
        .unwrap_err();

    let message = err.to_string();
    assert_matches!(err, RunnerError::Process(failure) => {
        assert_eq!(failure.exit_code, 3);
        assert_eq!(failure.signal, None);
        assert_eq!(failure.stdout.as_deref(), Some("partial\n"));
        assert_eq!(failure.stderr.as_deref(), Some("oops\n"));
        assert!(failure.command.contains("-d display_errors=stdout"));
        assert!(failure.command.contains("clirunner-temp1.php"));
        assert!(message.starts_with("Process failed with return code 3\nstdout: partial\n"));
        assert!(message.ends_with(&format!("Command line executed:\n{}", failure.command)));
    });
    assert!(leftover_scratch_files(dir.path()).is_empty());
}

#[test]
fn non_zero_exit_with_file_capture_keeps_output() {
    let dir = tempfile::tempdir().unwrap();
    let err = runner(dir.path())
        .run("echo saved >&2; exit 7", Discard, ToFile)
        .unwrap_err();
    assert_matches!(err, RunnerError::Process(failure) => {
        assert_eq!(failure.exit_code, 7);
        assert_eq!(failure.stdout, None);
        assert_eq!(failure.stderr.as_deref(), Some("saved\n"));
    });
}

#[test]
fn silent_hung_child_times_out_and_is_killed() {
    let dir = tempfile::tempdir().unwrap();
    let marker = tempfile::tempdir().unwrap();
    let pid_file = marker.path().join("pid");
    let timeout = Duration::from_millis(300);

    let start = Instant::now();
    let err = runner_with_timeout(dir.path(), timeout)
        .run(
            &format!("echo $$ > '{}'; exec sleep 30", pid_file.display()),
            Piped,
            Piped,
        )
        .unwrap_err();
    let elapsed = start.elapsed();

    assert_matches!(err, RunnerError::Timeout { timeout: t } if t == timeout);
    assert!(elapsed < timeout + Duration::from_secs(3), "took {elapsed:?}");

    let pid: libc::pid_t = fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
    // SAFETY: signal 0 only probes for existence.
    let alive = unsafe { libc::kill(pid, 0) } == 0;
    assert!(!alive, "child {pid} still running");
    assert!(leftover_scratch_files(dir.path()).is_empty());
}

#[test]
fn hung_child_without_pipes_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let timeout = Duration::from_millis(300);

    let start = Instant::now();
    let err = runner_with_timeout(dir.path(), timeout)
        .run("echo started; exec sleep 30", ToFile, Discard)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(start.elapsed() < timeout + Duration::from_secs(3));
    assert!(leftover_scratch_files(dir.path()).is_empty());
}

#[test]
fn missing_interpreter_is_an_environment_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Runner::new(
        RunnerConfig::default()
            .with_temp_dir(dir.path())
            .with_interpreter(dir.path().join("no-such-php")),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Environment);
}

// ---------------------------------------------------------------------------
// Real interpreter (only when TEST_PHP_EXECUTABLE is set)
// ---------------------------------------------------------------------------

#[test]
fn real_php_when_available() {
    let Some(php) = std::env::var_os("TEST_PHP_EXECUTABLE") else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let runner = Runner::new(
        RunnerConfig::default()
            .with_temp_dir(dir.path())
            .with_interpreter(php),
    )
    .unwrap();

    let out = runner.run("echo 'hello', PHP_EOL;", Piped, Piped).unwrap();
    assert_eq!(out, RunOutput::Text(">hello".into()));

    let err = runner.run("exit(4);", Piped, Piped).unwrap_err();
    assert_matches!(err, RunnerError::Process(f) if f.exit_code == 4);
}
