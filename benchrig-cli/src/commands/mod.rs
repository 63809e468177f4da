//! Command handler modules for the CLI.

mod cleanup;
mod completions;
mod estimate;
mod exec;
mod run;
mod stop;
mod summarize;

use std::path::Path;

use crate::cli::Commands;
use crate::error::CliError;

/// Dispatch a CLI command to the appropriate handler.
pub fn dispatch(config_path: Option<&Path>, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Run(args) => run::cmd_run(config_path, &args),
        Commands::Exec(args) => exec::cmd_exec(config_path, &args),
        Commands::Stop {
            host,
            binaries,
            wait,
        } => stop::cmd_stop(config_path, &host, &binaries, wait),
        Commands::Cleanup { binaries } => cleanup::cmd_cleanup(config_path, binaries),
        Commands::Estimate {
            log,
            ratio,
            floor,
            min_samples,
            all_samples,
            format,
        } => estimate::cmd_estimate(
            config_path,
            &log,
            estimate::WindowOverrides {
                ratio,
                floor,
                min_samples,
                all_samples,
            },
            format,
        ),
        Commands::Summarize {
            csv,
            experiment,
            format,
        } => summarize::cmd_summarize(&csv, experiment.into(), format),
        Commands::Completions { shell } => completions::cmd_completions(shell),
    }
}
