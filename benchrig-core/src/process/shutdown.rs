//! Escalating shutdown of benchmark binaries on fleet nodes
//!
//! A remote benchmark is not a local child: the local handle only owns the
//! `ssh` client. Stopping the benchmark itself means signalling it by name on
//! its node with `pkill -f`, escalating from SIGINT (which lets it flush its
//! statistics) to SIGTERM and finally SIGKILL.

use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tracing::{Instrument, debug, info_span, warn};

use super::handle::ProcessHandle;
use super::lifecycle::stop;
use crate::command::{self, argv};
use crate::error::{ProcessError, ProcessResult};
use crate::target::Target;
use crate::tracing::span_names;

/// Bound on one `pkill` round-trip
pub const SIGNAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Signal sent to a binary on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteSignal {
    /// SIGINT: ask the benchmark to finish and print its results
    Int,
    /// SIGTERM
    Term,
    /// SIGKILL
    Kill,
}

impl RemoteSignal {
    /// Signal name as understood by `pkill -<NAME>`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "INT",
            Self::Term => "TERM",
            Self::Kill => "KILL",
        }
    }
}

impl fmt::Display for RemoteSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sends `signal` to every process on `target` whose command line matches
/// `binary`
///
/// pkill's exit status is ignored, so "no process matched" is not an error.
///
/// # Errors
///
/// Returns `ConnectionFailure` if the command cannot be spawned or does not
/// complete within [`SIGNAL_TIMEOUT`], and `Io` if waiting on it fails.
pub async fn signal_binary(
    target: &Target,
    workdir: &Path,
    binary: &str,
    signal: RemoteSignal,
) -> ProcessResult<()> {
    let cmdline = command::build(
        target,
        workdir,
        &argv(["pkill".to_string(), format!("-{signal}"), "-f".to_string(), binary.to_string()]),
    );
    let mut cmd = cmdline.to_tokio_command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| ProcessError::ConnectionFailure {
        target: target.to_string(),
        reason: e.to_string(),
    })?;

    match tokio::time::timeout(SIGNAL_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(node = %target, binary, %signal, status = ?status.code(), "Signal sent");
            Ok(())
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_) => {
            let _ = child.start_kill();
            Err(ProcessError::ConnectionFailure {
                target: target.to_string(),
                reason: format!(
                    "pkill -{signal} {binary} did not complete within {}s",
                    SIGNAL_TIMEOUT.as_secs()
                ),
            })
        }
    }
}

async fn send_logged(target: &Target, workdir: &Path, binary: &str, signal: RemoteSignal) {
    if let Err(e) = signal_binary(target, workdir, binary, signal).await {
        warn!(node = %target, binary, %signal, error = %e, "Failed to signal binary");
    }
}

/// Waits for the optional local handle; without one there is nothing to
/// observe and the step counts as done
async fn handle_exited(handle: Option<&mut ProcessHandle>, wait: Duration) -> bool {
    match handle {
        Some(handle) => handle.wait_exit(wait).await,
        None => true,
    }
}

/// Stops `binary` on `target`, escalating INT, TERM, KILL
///
/// After each of INT and TERM the local handle (if any) gets `wait` to exit;
/// the next signal is only sent if it is still running. The local handle is
/// then stopped unconditionally. Completes within roughly `3 * wait` plus the
/// signalling round-trips and never fails: every error is logged.
pub async fn graceful_stop_remote(
    target: &Target,
    workdir: &Path,
    binary: &str,
    mut handle: Option<&mut ProcessHandle>,
    wait: Duration,
) {
    let span = info_span!(span_names::SHUTDOWN_ESCALATE, node = %target, binary);
    async {
        send_logged(target, workdir, binary, RemoteSignal::Int).await;
        if !handle_exited(handle.as_deref_mut(), wait).await {
            debug!("Still running after SIGINT");
            send_logged(target, workdir, binary, RemoteSignal::Term).await;
            if !handle_exited(handle.as_deref_mut(), wait).await {
                warn!("Still running after SIGTERM, sending SIGKILL");
                send_logged(target, workdir, binary, RemoteSignal::Kill).await;
            }
        }

        if let Some(handle) = handle {
            stop(handle).await;
        }
    }
    .instrument(span)
    .await;
}

/// Sends SIGTERM to each of `binaries` on `target`, ignoring every failure
pub async fn force_cleanup_binaries<S: AsRef<str>>(target: &Target, workdir: &Path, binaries: &[S]) {
    for binary in binaries {
        let binary = binary.as_ref();
        if let Err(e) = signal_binary(target, workdir, binary, RemoteSignal::Term).await {
            debug!(node = %target, binary, error = %e, "Cleanup signal failed");
        }
    }
}

/// Runs [`force_cleanup_binaries`] on every target of the fleet
pub async fn cleanup_fleet<S: AsRef<str>>(targets: &[Target], workdir: &Path, binaries: &[S]) {
    for target in targets {
        force_cleanup_binaries(target, workdir, binaries).await;
    }
}
