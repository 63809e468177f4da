//! Shared utility functions used across command modules.

use std::path::Path;

use benchrig_core::{BenchConfig, ConfigManager};

use crate::error::CliError;

/// Loads the configuration, from an explicit file when `--config` is given
pub fn load_config(config_path: Option<&Path>) -> Result<BenchConfig, CliError> {
    let loaded = match config_path {
        Some(path) => ConfigManager::load_from(path),
        None => ConfigManager::new().and_then(|manager| manager.load()),
    };
    loaded.map_err(|e| CliError::Config(e.to_string()))
}

/// Creates the async runtime for commands that talk to processes
pub fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Config(format!("Failed to create async runtime: {e}")))
}

/// Seconds as a `Duration`, rejecting negative or non-finite values
pub fn seconds(value: f64, what: &str) -> Result<std::time::Duration, CliError> {
    std::time::Duration::try_from_secs_f64(value)
        .map_err(|_| CliError::Config(format!("{what} must be a non-negative number of seconds")))
}
