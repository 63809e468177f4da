//! `benchrig` CLI - orchestrator for DPU offload experiments
//!
//! Runs the experiment sweeps, executes and stops single commands on fleet
//! nodes, and post-processes sampler logs and result files.

mod cli;
mod commands;
mod error;
mod util;

use benchrig_core::{TracingConfig, TracingLevel, TracingOutput, init_tracing};
use clap::Parser;
use cli::Cli;

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let level = TracingLevel::from_verbosity(cli.verbose, cli.quiet);
    let mut tracing_config = TracingConfig::new().with_level(level);
    if let Some(ref path) = cli.log_file {
        tracing_config = tracing_config.with_output(TracingOutput::File(path.clone()));
    }
    if let Err(e) = init_tracing(&tracing_config) {
        eprintln!("Warning: {e}");
    }

    let result = commands::dispatch(config_path, cli.command);

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e}");
        }
        std::process::exit(e.exit_code());
    }
}
