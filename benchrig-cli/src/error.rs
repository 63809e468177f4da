//! CLI error types and exit codes.

use benchrig_core::{BenchError, ProcessError};

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - configuration, validation, or IO errors
    pub const GENERAL_ERROR: i32 = 1;
    /// Process failure - a node was unreachable, a run timed out or a role
    /// exited with a non-zero code
    pub const PROCESS_FAILURE: i32 = 2;
    /// Measurement failure - a metric or telemetry series was missing
    pub const MEASUREMENT_FAILURE: i32 = 3;
    /// Interrupted by SIGINT
    pub const INTERRUPTED: i32 = 130;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Process orchestration error
    #[error("{0}")]
    Process(String),

    /// Metric or telemetry error
    #[error("{0}")]
    Measurement(String),

    /// A command run through `exec` finished unsuccessfully
    #[error("Command exited with code {0}")]
    ChildExit(i32),

    /// The sweep was interrupted
    #[error("Interrupted; remaining benchmark processes were terminated")]
    Interrupted,

    /// Output formatting error
    #[error("Output error: {0}")]
    Output(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BenchError> for CliError {
    fn from(err: BenchError) -> Self {
        match err {
            BenchError::Config(e) => Self::Config(e.to_string()),
            BenchError::Process(ProcessError::Io(e)) | BenchError::Io(e) => Self::Io(e),
            BenchError::Process(e) => Self::Process(e.to_string()),
            BenchError::Metric(e) => Self::Measurement(e.to_string()),
            BenchError::Telemetry(e) => Self::Measurement(e.to_string()),
        }
    }
}

impl CliError {
    /// Returns the appropriate exit code for this error type.
    ///
    /// Exit codes:
    /// - 0: Success (not an error)
    /// - 1: General error (configuration, output, IO)
    /// - 2: Process failure (connection, timeout, non-zero exit)
    /// - 3: Measurement failure (metric not found, empty series)
    /// - 130: Interrupted
    /// - `exec` propagates the code of the command it ran
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Process(_) => exit_codes::PROCESS_FAILURE,
            Self::Measurement(_) => exit_codes::MEASUREMENT_FAILURE,
            Self::ChildExit(code) => *code,
            Self::Interrupted => exit_codes::INTERRUPTED,
            Self::Config(_) | Self::Output(_) | Self::Io(_) => exit_codes::GENERAL_ERROR,
        }
    }
}
