//! Spawned process handles

use std::fs::File;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::task::JoinHandle;

use crate::error::{ProcessError, ProcessResult};

/// How a process's output is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessMode {
    /// stdout and stderr written to a log file owned by the handle
    Background,
    /// stdout and stderr piped back to the orchestrator
    Captured,
}

/// Lifecycle state of a spawned process
///
/// A role that was never started has no handle at all, so there is no
/// "not started" variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Spawned and not yet reaped
    Running,
    /// Exited on its own with this code
    Exited(i32),
    /// Terminated by a signal
    Killed,
}

impl ProcessState {
    /// Returns true once the process has been reaped
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Exit code and merged output of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Exit code (`128 + signo` when terminated by a signal)
    pub exit_code: i32,
    /// Merged stdout/stderr
    pub output: String,
}

impl RunResult {
    /// Returns true if the process exited with code 0
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Fails with [`ProcessError::NonZeroExit`] unless the exit code is 0
    ///
    /// # Errors
    ///
    /// Returns `NonZeroExit` naming `role` and `log_path`.
    pub fn ensure_success(self, role: &str, log_path: &Path) -> ProcessResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(ProcessError::NonZeroExit {
                role: role.to_string(),
                code: self.exit_code,
                log_path: log_path.to_path_buf(),
            })
        }
    }
}

/// Exit code reported for a process the orchestrator killed (`128 + SIGKILL`)
pub const KILLED_EXIT_CODE: i32 = 137;

/// Shared buffer the pipe readers append to
pub(crate) type CaptureBuffer = Arc<Mutex<Vec<u8>>>;

/// Where a handle's output goes
#[derive(Debug)]
pub(crate) enum OutputSink {
    /// Log file, kept open for the lifetime of the handle
    LogFile { path: PathBuf, _file: File },
    /// Pipe readers draining into a shared buffer
    Pipe {
        buffer: CaptureBuffer,
        readers: Vec<JoinHandle<()>>,
    },
}

/// One spawned process
///
/// Owned exclusively by whoever started it. Dropping a handle kills the local
/// child process if it is still running.
#[derive(Debug)]
pub struct ProcessHandle {
    pub(crate) child: Child,
    mode: ProcessMode,
    state: ProcessState,
    exit_code: Option<i32>,
    label: String,
    pub(crate) sink: OutputSink,
    started_at: Instant,
}

impl ProcessHandle {
    pub(crate) fn background(child: Child, label: String, path: PathBuf, file: File) -> Self {
        Self {
            child,
            mode: ProcessMode::Background,
            state: ProcessState::Running,
            exit_code: None,
            label,
            sink: OutputSink::LogFile { path, _file: file },
            started_at: Instant::now(),
        }
    }

    pub(crate) fn captured(mut child: Child, label: String) -> Self {
        let buffer: CaptureBuffer = Arc::new(Mutex::new(Vec::new()));
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(pump(stdout, Arc::clone(&buffer))));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(pump(stderr, Arc::clone(&buffer))));
        }
        Self {
            child,
            mode: ProcessMode::Captured,
            state: ProcessState::Running,
            exit_code: None,
            label,
            sink: OutputSink::Pipe { buffer, readers },
            started_at: Instant::now(),
        }
    }

    /// Output mode
    #[must_use]
    pub const fn mode(&self) -> ProcessMode {
        self.mode
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> ProcessState {
        self.state
    }

    /// Exit code once reaped (`128 + signo` for signal deaths)
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Returns true until the process has been reaped
    #[must_use]
    pub const fn is_running(&self) -> bool {
        !self.state.is_terminal()
    }

    /// The command line this handle was started with
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Local process id, if the process has not been reaped
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Time since the process was spawned
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Log file of a background handle
    #[must_use]
    pub fn log_path(&self) -> Option<&Path> {
        match &self.sink {
            OutputSink::LogFile { path, .. } => Some(path),
            OutputSink::Pipe { .. } => None,
        }
    }

    /// Records an exit status and returns the exit code
    pub(crate) fn record_exit(&mut self, status: ExitStatus) -> i32 {
        let code = if let Some(code) = status.code() {
            self.state = ProcessState::Exited(code);
            code
        } else {
            self.state = ProcessState::Killed;
            128 + status.signal().unwrap_or(0)
        };
        self.exit_code = Some(code);
        code
    }

    /// Marks a process the orchestrator killed but could not reap
    pub(crate) fn mark_killed(&mut self) {
        if self.is_running() {
            self.state = ProcessState::Killed;
            self.exit_code = Some(KILLED_EXIT_CODE);
        }
    }

    /// Non-blocking check whether the process has exited
    ///
    /// Returns true if the process is (now) in a terminal state.
    pub fn try_reap(&mut self) -> bool {
        if !self.is_running() {
            return true;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.record_exit(status);
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::debug!(error = %e, label = %self.label, "try_wait failed");
                false
            }
        }
    }

    /// Waits up to `bound` for the process to exit
    ///
    /// Returns true if the process is in a terminal state afterwards.
    pub async fn wait_exit(&mut self, bound: Duration) -> bool {
        if !self.is_running() {
            return true;
        }
        match tokio::time::timeout(bound, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.record_exit(status);
                true
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, label = %self.label, "wait failed");
                false
            }
            Err(_) => false,
        }
    }

    /// Collects everything the process wrote so far
    ///
    /// Pipe readers get `drain` to reach end-of-file; readers still blocked
    /// after that (for example on a grandchild holding the pipe open) are
    /// aborted and whatever was buffered is returned.
    pub(crate) async fn collect_output(&mut self, drain: Duration) -> String {
        match &mut self.sink {
            OutputSink::LogFile { path, .. } => match std::fs::read(&*path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    tracing::warn!(error = %e, log_path = %path.display(), "Cannot read back process log");
                    String::new()
                }
            },
            OutputSink::Pipe { buffer, readers } => {
                let deadline = tokio::time::Instant::now() + drain;
                for reader in readers.iter_mut() {
                    if tokio::time::timeout_at(deadline, &mut *reader).await.is_err() {
                        reader.abort();
                    }
                }
                readers.clear();
                let bytes = buffer.lock().unwrap_or_else(PoisonError::into_inner);
                String::from_utf8_lossy(&bytes).into_owned()
            }
        }
    }
}

/// Copies one pipe into the shared capture buffer until end-of-file
async fn pump<R>(mut reader: R, buffer: CaptureBuffer)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(&chunk[..n]),
            Err(e) => {
                tracing::debug!(error = %e, "Pipe read failed");
                break;
            }
        }
    }
}
