//! Run one command on a node.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use benchrig_core::process::run_and_capture;
use benchrig_core::{BenchConfig, BenchError, Target};

use crate::cli::ExecArgs;
use crate::error::CliError;
use crate::util::{load_config, runtime};

/// Target of `exec`: the configured node or host, with per-call overrides
fn exec_target(config: &BenchConfig, args: &ExecArgs) -> Target {
    let mut target = config.resolve_host(&args.host);
    if let Some(ref user) = args.user {
        target = target.with_user(user.clone());
    }
    if let Some(port) = args.port {
        target = target.with_port(port);
    }
    if let Some(ref identity) = args.identity {
        target = target.with_identity_file(identity.clone());
    }
    if args.sudo {
        target = target.with_elevate(true);
    } else if args.no_sudo {
        target = target.with_elevate(false);
    }
    target
}

fn default_log() -> PathBuf {
    std::env::temp_dir().join(format!("benchrig-exec-{}.log", std::process::id()))
}

/// Exec command handler
pub fn cmd_exec(config_path: Option<&Path>, args: &ExecArgs) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let target = exec_target(&config, args);
    let workdir = args.workdir.as_deref().unwrap_or(&config.workdir);
    let timeout = args
        .timeout
        .map_or_else(|| config.timing.run_timeout(), Duration::from_secs);
    let log = args.log.clone().unwrap_or_else(default_log);

    let result = runtime()?
        .block_on(run_and_capture(&target, workdir, &args.argv, timeout, &log))
        .map_err(BenchError::from)?;

    let mut out = std::io::stdout().lock();
    out.write_all(result.output.as_bytes())?;
    out.flush()?;

    if result.success() {
        Ok(())
    } else {
        Err(CliError::ChildExit(result.exit_code))
    }
}
