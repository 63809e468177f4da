//! Integration tests for the escalating stop protocol and fleet cleanup

use std::time::{Duration, Instant};

use benchrig_core::Target;
use benchrig_core::process::{
    ProcessState, RemoteSignal, force_cleanup_binaries, graceful_stop_remote, signal_binary,
    start_background,
};

use super::support::{argv, marker};

/// A bash loop whose command line carries `tag`, optionally ignoring INT/TERM
fn looping(tag: &str, stubborn: bool) -> Vec<String> {
    let body = if stubborn {
        "trap '' INT TERM; while :; do sleep 0.1; done"
    } else {
        "while :; do sleep 0.1; done"
    };
    argv(&["bash", "-c", body, tag])
}

#[tokio::test]
async fn escalation_reaches_sigkill_within_bound() {
    let dir = tempfile::tempdir().unwrap();
    let tag = marker("stubborn");
    let mut handle = start_background(
        &Target::local(),
        dir.path(),
        &looping(&tag, true),
        &dir.path().join("stubborn.log"),
    )
    .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let wait = Duration::from_secs(1);
    let started = Instant::now();
    graceful_stop_remote(&Target::local(), dir.path(), &tag, Some(&mut handle), wait).await;
    let elapsed = started.elapsed();

    assert!(!handle.is_running());
    assert_eq!(handle.state(), ProcessState::Killed);
    assert!(elapsed >= wait * 2);
    assert!(elapsed < wait * 3 + Duration::from_secs(5), "took {elapsed:?}");
}

#[tokio::test]
async fn escalation_stops_after_term_when_term_suffices() {
    let dir = tempfile::tempdir().unwrap();
    let tag = marker("polite");
    let mut handle = start_background(
        &Target::local(),
        dir.path(),
        &looping(&tag, false),
        &dir.path().join("polite.log"),
    )
    .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let wait = Duration::from_secs(1);
    let started = Instant::now();
    graceful_stop_remote(&Target::local(), dir.path(), &tag, Some(&mut handle), wait).await;

    assert!(!handle.is_running());
    assert!(started.elapsed() < wait * 3 + Duration::from_secs(5));
}

#[tokio::test]
async fn direct_signal_terminates_matching_process() {
    let dir = tempfile::tempdir().unwrap();
    let tag = marker("signalled");
    let mut handle = start_background(
        &Target::local(),
        dir.path(),
        &looping(&tag, false),
        &dir.path().join("signalled.log"),
    )
    .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    signal_binary(&Target::local(), dir.path(), &tag, RemoteSignal::Kill)
        .await
        .unwrap();
    assert!(handle.wait_exit(Duration::from_secs(5)).await);
    assert_eq!(handle.state(), ProcessState::Killed);
}

#[tokio::test]
async fn cleanup_terminates_leftovers() {
    let dir = tempfile::tempdir().unwrap();
    let tag = marker("leftover");
    let mut handle = start_background(
        &Target::local(),
        dir.path(),
        &looping(&tag, false),
        &dir.path().join("leftover.log"),
    )
    .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let missing = marker("missing");
    force_cleanup_binaries(&Target::local(), dir.path(), &[missing.as_str(), tag.as_str()]).await;

    assert!(handle.wait_exit(Duration::from_secs(5)).await);
    assert!(!handle.is_running());
}
