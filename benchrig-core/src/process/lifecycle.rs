//! Spawning, waiting on and stopping benchmark processes

use std::fs::File;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::{Instrument, debug, info, info_span, warn};

use super::handle::{KILLED_EXIT_CODE, ProcessHandle, RunResult};
use crate::command::{self, CommandLine};
use crate::error::{ProcessError, ProcessResult};
use crate::target::Target;
use crate::tracing::span_names;

/// Grace period between SIGTERM and SIGKILL in [`stop`], and the bound on
/// reaping after SIGKILL
pub const STOP_GRACE: Duration = Duration::from_secs(5);

/// How long pipe readers may keep draining after the process is gone
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Creates the parent directory of `path` if needed
fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

fn spawn(
    target: &Target,
    cmdline: &CommandLine,
    stdout: Stdio,
    stderr: Stdio,
) -> ProcessResult<tokio::process::Child> {
    let mut cmd = cmdline.to_tokio_command();
    cmd.stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true);

    cmd.spawn().map_err(|e| ProcessError::ConnectionFailure {
        target: target.to_string(),
        reason: e.to_string(),
    })
}

/// Starts `argv` on `target` with both output streams appended to `log_path`
///
/// The log file is created (or truncated) before the process starts and stays
/// open for as long as the handle lives.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns `Io` if the log cannot be created and `ConnectionFailure` if the
/// local shell or SSH client cannot be spawned.
pub fn start_background(
    target: &Target,
    workdir: &Path,
    argv: &[String],
    log_path: &Path,
) -> ProcessResult<ProcessHandle> {
    let _span = info_span!(span_names::PROCESS_SPAWN, node = %target, mode = "background").entered();

    ensure_parent(log_path)?;
    let file = File::create(log_path)?;
    let cmdline = command::build(target, workdir, argv);
    let child = spawn(
        target,
        &cmdline,
        Stdio::from(file.try_clone()?),
        Stdio::from(file.try_clone()?),
    )?;

    info!(pid = ?child.id(), log_path = %log_path.display(), "Started background process");
    Ok(ProcessHandle::background(
        child,
        cmdline.to_string(),
        log_path.to_path_buf(),
        file,
    ))
}

/// Starts `argv` on `target` with stdout and stderr captured into one buffer
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns `ConnectionFailure` if the local shell or SSH client cannot be
/// spawned.
pub fn start_captured(
    target: &Target,
    workdir: &Path,
    argv: &[String],
) -> ProcessResult<ProcessHandle> {
    let _span = info_span!(span_names::PROCESS_SPAWN, node = %target, mode = "captured").entered();

    let cmdline = command::build(target, workdir, argv);
    let child = spawn(target, &cmdline, Stdio::piped(), Stdio::piped())?;

    debug!(pid = ?child.id(), command = %cmdline, "Started captured process");
    Ok(ProcessHandle::captured(child, cmdline.to_string()))
}

fn persist(log_path: &Path, output: &str) -> ProcessResult<()> {
    ensure_parent(log_path)?;
    std::fs::write(log_path, output)?;
    Ok(())
}

/// Waits for `handle` to exit, bounded by `timeout`
///
/// Captured output is written to `log_path` in every outcome, including the
/// timeout path, before anything is returned. Background handles return the
/// contents of their own log file and leave `log_path` untouched.
///
/// # Errors
///
/// Returns `Timeout` (after killing the process and persisting partial output)
/// when the bound elapses, even if the partial output cannot be written, or
/// `Io` if waiting or persisting a finished process's output fails.
pub async fn wait(
    handle: &mut ProcessHandle,
    timeout: Duration,
    log_path: &Path,
) -> ProcessResult<RunResult> {
    let span = info_span!(span_names::PROCESS_WAIT, command = %handle.label(), timeout_secs = timeout.as_secs_f64());
    wait_inner(handle, timeout, log_path).instrument(span).await
}

async fn wait_inner(
    handle: &mut ProcessHandle,
    timeout: Duration,
    log_path: &Path,
) -> ProcessResult<RunResult> {
    let persist_captured = |handle: &ProcessHandle, output: &str| -> ProcessResult<()> {
        if handle.log_path().is_none() {
            persist(log_path, output)?;
        }
        Ok(())
    };

    let exit_code = if handle.is_running() {
        match tokio::time::timeout(timeout, handle.child.wait()).await {
            Ok(Ok(status)) => handle.record_exit(status),
            Ok(Err(e)) => {
                let output = handle.collect_output(DRAIN_TIMEOUT).await;
                if let Err(persist_err) = persist_captured(handle, &output) {
                    warn!(error = %persist_err, log_path = %log_path.display(), "Cannot persist output");
                }
                return Err(e.into());
            }
            Err(_) => {
                warn!("Process exceeded its timeout, killing it");
                force_kill(handle).await;
                let output = handle.collect_output(DRAIN_TIMEOUT).await;
                if let Err(e) = persist_captured(handle, &output) {
                    warn!(error = %e, log_path = %log_path.display(), "Cannot persist partial output");
                }
                return Err(ProcessError::Timeout {
                    command: handle.label().to_string(),
                    timeout,
                    log_path: handle
                        .log_path()
                        .unwrap_or(log_path)
                        .to_path_buf(),
                });
            }
        }
    } else {
        handle.exit_code().unwrap_or(KILLED_EXIT_CODE)
    };

    let output = handle.collect_output(DRAIN_TIMEOUT).await;
    persist_captured(handle, &output)?;
    debug!(exit_code, bytes = output.len(), "Process finished");
    Ok(RunResult { exit_code, output })
}

/// Starts a captured process and waits for it
///
/// # Errors
///
/// See [`start_captured`] and [`wait`].
pub async fn run_and_capture(
    target: &Target,
    workdir: &Path,
    argv: &[String],
    timeout: Duration,
    log_path: &Path,
) -> ProcessResult<RunResult> {
    let mut handle = start_captured(target, workdir, argv)?;
    wait(&mut handle, timeout, log_path).await
}

/// Sends SIGKILL and reaps the process, bounded by [`STOP_GRACE`]
async fn force_kill(handle: &mut ProcessHandle) {
    if let Err(e) = handle.child.start_kill() {
        debug!(error = %e, "start_kill failed");
    }
    if !handle.wait_exit(STOP_GRACE).await {
        warn!(command = %handle.label(), "Process did not exit after SIGKILL");
    }
    handle.mark_killed();
}

/// Stops a local child process
///
/// Idempotent: a handle that already exited is left alone. Otherwise sends
/// SIGTERM, waits up to [`STOP_GRACE`], then SIGKILL and waits again. Never
/// fails and never blocks longer than twice the grace period.
pub async fn stop(handle: &mut ProcessHandle) {
    let span = info_span!(span_names::PROCESS_STOP, command = %handle.label());
    async {
        if handle.try_reap() {
            return;
        }

        if let Some(pid) = handle.pid() {
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                debug!(pid, error = %e, "SIGTERM failed");
            }
        }
        if handle.wait_exit(STOP_GRACE).await {
            debug!(state = ?handle.state(), "Process stopped after SIGTERM");
            return;
        }

        warn!("Process ignored SIGTERM, killing it");
        force_kill(handle).await;
    }
    .instrument(span)
    .await;
}
