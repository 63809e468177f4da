//! Fleet-wide cleanup of leftover benchmark processes.

use std::path::Path;

use benchrig_core::process::cleanup_fleet;
use benchrig_core::{BenchConfig, Experiment, RxCache, Solar, TxOffload};

use crate::error::CliError;
use crate::util::{load_config, runtime};

/// Every binary any experiment may leave running, without duplicates
pub fn default_binaries(config: &BenchConfig) -> Vec<String> {
    let mut binaries = TxOffload::new(config).binaries();
    binaries.extend(RxCache::new(config).binaries());
    binaries.extend(Solar::new(config).binaries());

    let mut seen = std::collections::HashSet::new();
    binaries.retain(|b| seen.insert(b.clone()));
    binaries
}

/// Cleanup command handler
pub fn cmd_cleanup(config_path: Option<&Path>, binaries: Vec<String>) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let binaries = if binaries.is_empty() {
        default_binaries(&config)
    } else {
        binaries
    };
    let fleet = config.fleet();

    runtime()?.block_on(cleanup_fleet(&fleet, &config.workdir, &binaries));
    println!(
        "Sent SIGTERM to {} binaries on {} nodes",
        binaries.len(),
        fleet.len()
    );
    Ok(())
}
