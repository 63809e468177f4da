//! Stop binaries on a node.

use std::path::Path;

use benchrig_core::process::graceful_stop_remote;

use crate::error::CliError;
use crate::util::{load_config, runtime, seconds};

/// Stop command handler
///
/// Without a local handle every escalation step is sent: SIGINT, then
/// SIGTERM, then SIGKILL, each followed by the wait.
pub fn cmd_stop(
    config_path: Option<&Path>,
    host: &str,
    binaries: &[String],
    wait: Option<f64>,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let target = config.resolve_host(host);
    let wait = match wait {
        Some(secs) => seconds(secs, "--wait")?,
        None => config.timing.stop_wait(),
    };

    let runtime = runtime()?;
    for binary in binaries {
        runtime.block_on(graceful_stop_remote(
            &target,
            &config.workdir,
            binary,
            None,
            wait,
        ));
        println!("Stopped {binary} on {target}");
    }
    Ok(())
}
