//! Error types for benchrig
//!
//! Each concern (process orchestration, metric extraction, telemetry,
//! configuration) has its own error enum. [`BenchError`] wraps all of them so
//! experiment drivers can propagate any failure with `?`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while spawning, waiting on, or signalling processes
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The local shell or the SSH client could not be spawned
    #[error("Failed to launch command on {target}: {reason}")]
    ConnectionFailure {
        /// Target description (`user@host` or `local`)
        target: String,
        /// Underlying spawn error
        reason: String,
    },

    /// The process did not exit within its bound and was killed
    #[error("Command timed out after {:.1}s: {command} (partial output in {})", .timeout.as_secs_f64(), .log_path.display())]
    Timeout {
        /// Human readable command line
        command: String,
        /// The bound that elapsed
        timeout: Duration,
        /// Where the partial output was persisted
        log_path: PathBuf,
    },

    /// The process exited but reported failure
    #[error("{role} exited with code {code}. Check {}.", .log_path.display())]
    NonZeroExit {
        /// Role name (relay, client, ...)
        role: String,
        /// Exit code
        code: i32,
        /// Log with the full output
        log_path: PathBuf,
    },

    /// Log file or pipe I/O failed
    #[error("Process I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while extracting throughput metrics from benchmark output
#[derive(Debug, Error)]
pub enum MetricError {
    /// Neither the structured line nor the fallback pattern matched
    #[error("Cannot parse metric '{key}' from output. Check {}.", .log_path.display())]
    MetricNotFound {
        /// Structured key that was looked up
        key: String,
        /// Log holding the output that was scanned
        log_path: PathBuf,
    },

    /// A `RESULT|` line carries the key but its value is not a number
    #[error("Metric '{key}' has non-numeric value '{value}'. Check {}.", .log_path.display())]
    InvalidMetric {
        /// Structured key that was looked up
        key: String,
        /// Raw field value
        value: String,
        /// Log holding the output that was scanned
        log_path: PathBuf,
    },

    /// A fallback pattern does not have exactly one capture group
    #[error("Invalid metric pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Errors raised while reading counters or post-processing telemetry
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A required field is absent from a result row
    #[error("Missing telemetry field '{field}' in {source_name}")]
    MissingTelemetryField {
        /// Field (CSV column) name
        field: String,
        /// File or row description
        source_name: String,
    },

    /// A bandwidth series has no samples
    #[error("No bandwidth samples found in {0}")]
    EmptySeries(String),

    /// A sampler log does not exist
    #[error("Sampler log not found: {}", .0.display())]
    LogNotFound(PathBuf),

    /// A hardware counter file could not be read or parsed
    #[error("Failed to read counter {}: {reason}", .path.display())]
    CounterRead {
        /// Counter file path
        path: PathBuf,
        /// Parse or I/O error text
        reason: String,
    },

    /// A value in a result file could not be parsed
    #[error("Invalid value '{value}' for '{field}' in {source_name}")]
    InvalidValue {
        /// Field (CSV column) name
        field: String,
        /// Raw value
        value: String,
        /// File or row description
        source_name: String,
    },

    /// Result file I/O or CSV decoding failed
    #[error("Result file error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        /// Config file path
        path: PathBuf,
        /// I/O error
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`crate::config::BenchConfig`]
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is outside its valid range or references an unknown node
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// No configuration directory could be determined
    #[error("Cannot determine configuration directory")]
    NoConfigDir,
}

/// Top-level error type for benchrig
#[derive(Debug, Error)]
pub enum BenchError {
    /// Process orchestration failure
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Metric extraction failure
    #[error(transparent)]
    Metric(#[from] MetricError),

    /// Telemetry failure
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O failure (result files, directories)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for benchrig operations
pub type BenchResult<T> = Result<T, BenchError>;

/// Result alias for process operations
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Result alias for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Result alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<csv::Error> for BenchError {
    fn from(err: csv::Error) -> Self {
        Self::Telemetry(TelemetryError::Csv(err))
    }
}
