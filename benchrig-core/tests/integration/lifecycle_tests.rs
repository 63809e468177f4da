//! Integration tests for spawning, waiting on and stopping local processes

use std::time::{Duration, Instant};

use benchrig_core::process::{
    self, KILLED_EXIT_CODE, ProcessMode, ProcessState, run_and_capture, start_background,
    start_captured,
};
use benchrig_core::{ProcessError, Target};

use super::support::argv;

#[tokio::test]
async fn captured_run_collects_both_streams_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("logs/relay.log");

    let result = run_and_capture(
        &Target::local(),
        dir.path(),
        &argv(&["bash", "-c", "echo to-stdout; echo to-stderr >&2; exit 3"]),
        Duration::from_secs(10),
        &log,
    )
    .await
    .unwrap();

    assert_eq!(result.exit_code, 3);
    assert!(!result.success());
    assert!(result.output.contains("to-stdout"));
    assert!(result.output.contains("to-stderr"));
    assert_eq!(std::fs::read_to_string(&log).unwrap(), result.output);
}

#[tokio::test]
async fn non_zero_exit_names_role_and_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("client.log");
    let result = run_and_capture(
        &Target::local(),
        dir.path(),
        &argv(&["bash", "-c", "exit 7"]),
        Duration::from_secs(10),
        &log,
    )
    .await
    .unwrap();

    let err = result.ensure_success("Client", &log).unwrap_err();
    assert!(matches!(err, ProcessError::NonZeroExit { code: 7, .. }));
    assert!(err.to_string().starts_with("Client exited with code 7."));
}

#[tokio::test]
async fn arguments_reach_the_process_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let tricky = ["a b", "it's", "$HOME", "`id`", "x;y", "\"q\"", ""];
    let mut tokens = vec!["printf", "<%s>\\n"];
    tokens.extend(tricky);

    let result = run_and_capture(
        &Target::local(),
        dir.path(),
        &argv(&tokens),
        Duration::from_secs(10),
        &dir.path().join("printf.log"),
    )
    .await
    .unwrap();

    let expected: String = tricky.iter().map(|t| format!("<{t}>\n")).collect();
    assert!(
        result.output.ends_with(&expected),
        "unexpected output: {:?}",
        result.output
    );
}

#[tokio::test]
async fn workdir_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "found").unwrap();

    let result = run_and_capture(
        &Target::local(),
        dir.path(),
        &argv(&["cat", "marker.txt"]),
        Duration::from_secs(10),
        &dir.path().join("cat.log"),
    )
    .await
    .unwrap();
    assert_eq!(result.exit_code, 0);
    assert!(result.output.ends_with("found"));
}

#[tokio::test]
async fn timeout_kills_and_persists_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("slow.log");
    let started = Instant::now();

    let err = run_and_capture(
        &Target::local(),
        dir.path(),
        &argv(&["bash", "-c", "echo partial-line; exec sleep 30"]),
        Duration::from_secs(1),
        &log,
    )
    .await
    .unwrap_err();

    match err {
        ProcessError::Timeout {
            timeout, log_path, ..
        } => {
            assert_eq!(timeout, Duration::from_secs(1));
            assert_eq!(log_path, log);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(std::fs::read_to_string(&log).unwrap().contains("partial-line"));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn timeout_is_reported_when_log_cannot_be_written() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "").unwrap();
    let log = blocker.join("slow.log");

    let err = run_and_capture(
        &Target::local(),
        dir.path(),
        &argv(&["sleep", "30"]),
        Duration::from_secs(1),
        &log,
    )
    .await
    .unwrap_err();

    assert!(
        matches!(err, ProcessError::Timeout { ref log_path, .. } if *log_path == log),
        "expected timeout, got {err:?}"
    );
    assert!(!log.exists());
}

#[tokio::test]
async fn background_output_goes_to_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("nested/server.log");

    let mut handle = start_background(
        &Target::local(),
        dir.path(),
        &argv(&["bash", "-c", "echo from-stdout; echo from-stderr >&2"]),
        &log,
    )
    .unwrap();
    assert_eq!(handle.mode(), ProcessMode::Background);
    assert_eq!(handle.log_path(), Some(log.as_path()));

    let unused = dir.path().join("unused.log");
    let result = process::wait(&mut handle, Duration::from_secs(10), &unused)
        .await
        .unwrap();
    assert_eq!(result.exit_code, 0);
    assert_eq!(handle.state(), ProcessState::Exited(0));

    let contents = std::fs::read_to_string(&log).unwrap();
    assert!(contents.contains("from-stdout"));
    assert!(contents.contains("from-stderr"));
    assert!(result.output.contains("from-stdout"));
    assert!(!unused.exists());
}

#[tokio::test]
async fn stop_terminates_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut handle = start_background(
        &Target::local(),
        dir.path(),
        &argv(&["sleep", "30"]),
        &dir.path().join("sleep.log"),
    )
    .unwrap();
    assert!(handle.is_running());

    let started = Instant::now();
    process::stop(&mut handle).await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!handle.is_running());
    assert_eq!(handle.state(), ProcessState::Killed);
    let code = handle.exit_code();
    assert!(code.is_some_and(|c| c > 128));

    process::stop(&mut handle).await;
    assert_eq!(handle.state(), ProcessState::Killed);
    assert_eq!(handle.exit_code(), code);
}

#[tokio::test]
async fn stop_escalates_to_sigkill() {
    let dir = tempfile::tempdir().unwrap();
    let mut handle = start_captured(
        &Target::local(),
        dir.path(),
        &argv(&["bash", "-c", "trap '' TERM; while :; do sleep 0.1; done"]),
    )
    .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let started = Instant::now();
    process::stop(&mut handle).await;
    let elapsed = started.elapsed();

    assert_eq!(handle.state(), ProcessState::Killed);
    assert_eq!(handle.exit_code(), Some(KILLED_EXIT_CODE));
    assert!(elapsed >= process::STOP_GRACE);
    assert!(elapsed < process::STOP_GRACE * 2 + Duration::from_secs(2));
}

#[tokio::test]
async fn stop_after_exit_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let mut handle = start_captured(&Target::local(), dir.path(), &argv(&["true"])).unwrap();
    let log = dir.path().join("true.log");
    let result = process::wait(&mut handle, Duration::from_secs(10), &log)
        .await
        .unwrap();
    assert_eq!(result.exit_code, 0);

    process::stop(&mut handle).await;
    assert_eq!(handle.state(), ProcessState::Exited(0));
}

#[tokio::test]
async fn wait_on_finished_handle_returns_stored_code() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("twice.log");
    let mut handle =
        start_captured(&Target::local(), dir.path(), &argv(&["bash", "-c", "exit 4"])).unwrap();

    let first = process::wait(&mut handle, Duration::from_secs(10), &log)
        .await
        .unwrap();
    let second = process::wait(&mut handle, Duration::from_secs(10), &log)
        .await
        .unwrap();
    assert_eq!(first.exit_code, 4);
    assert_eq!(second.exit_code, 4);
}
