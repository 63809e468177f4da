//! Run an experiment sweep.

use std::io::Write;
use std::path::{Path, PathBuf};

use benchrig_core::experiment::plan_all;
use benchrig_core::process::cleanup_fleet;
use benchrig_core::{
    BenchConfig, BenchError, Experiment, ResultWriter, RxCache, Solar, TxOffload, run_experiment,
};

use crate::cli::{ExperimentArg, RunArgs};
use crate::error::CliError;
use crate::util::{load_config, runtime};

/// Run command handler
pub fn cmd_run(config_path: Option<&Path>, args: &RunArgs) -> Result<(), CliError> {
    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, args)?;
    config
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let log_dir = args
        .log_dir
        .clone()
        .unwrap_or_else(|| config.results_dir.join("logs"));

    match args.experiment {
        ExperimentArg::TxOffload => run_suite(&TxOffload::new(&config), &config, &log_dir, args),
        ExperimentArg::RxCache => run_suite(&RxCache::new(&config), &config, &log_dir, args),
        ExperimentArg::Solar => run_suite(&Solar::new(&config), &config, &log_dir, args),
    }
}

/// Applies `--payload-sizes` and `--threads` to the selected experiment
fn apply_overrides(config: &mut BenchConfig, args: &RunArgs) -> Result<(), CliError> {
    let sizes = (!args.payload_sizes.is_empty()).then(|| args.payload_sizes.clone());

    match args.experiment {
        ExperimentArg::TxOffload => {
            if let Some(sizes) = sizes {
                config.tx_offload.payload_sizes = sizes;
            }
            if let Some(threads) = args.threads {
                config.tx_offload.threads = threads;
            }
        }
        ExperimentArg::RxCache => {
            if let Some(sizes) = sizes {
                config.rx_cache.payload_sizes = sizes;
            }
            if let Some(threads) = args.threads {
                config.rx_cache.threads = threads;
            }
        }
        ExperimentArg::Solar => {
            if let Some(sizes) = sizes {
                let [size] = sizes.as_slice() else {
                    return Err(CliError::Config(
                        "solar takes a single --payload-sizes value".to_string(),
                    ));
                };
                config.solar.payload_size = *size;
            }
            if let Some(threads) = args.threads {
                config.solar.thread_start = threads;
                config.solar.thread_end = threads;
            }
        }
    }
    Ok(())
}

fn default_output(config: &BenchConfig, experiment_id: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    config
        .results_dir
        .join(format!("{}_{stamp}.csv", experiment_id.replace('-', "_")))
}

fn print_plans<E: Experiment>(
    experiment: &E,
    config: &BenchConfig,
    log_dir: &Path,
) -> Result<(), CliError> {
    let plans = plan_all(experiment, log_dir)?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "{}: {} runs", experiment.display_name(), plans.len())?;
    for (_, plan) in &plans {
        writeln!(out, "\n# {} (port {})", plan.run_tag, plan.port)?;
        for role in &plan.roles {
            writeln!(
                out,
                "{:<7} {:<5} {}",
                role.role,
                role.node,
                role.command(&config.workdir)
            )?;
            writeln!(out, "{:<13} > {}", "", role.log_path.display())?;
        }
    }
    Ok(())
}

fn run_suite<E: Experiment>(
    experiment: &E,
    config: &BenchConfig,
    log_dir: &Path,
    args: &RunArgs,
) -> Result<(), CliError> {
    if args.dry_run {
        return print_plans(experiment, config, log_dir);
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(config, experiment.experiment_id()));
    let mut writer = ResultWriter::create(&output, &experiment.header())?;
    println!(
        "Running {} ({} runs), results in {}",
        experiment.display_name(),
        experiment.cases().len(),
        output.display()
    );

    let runtime = runtime()?;
    let finished = runtime.block_on(async {
        tokio::select! {
            result = run_experiment(experiment, config, log_dir, &mut writer) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        }
    });

    match finished {
        Some(result) => {
            let rows = result.map_err(|e| report_partial(e, &writer, &output))?;
            println!("Wrote {rows} rows to {}", output.display());
            Ok(())
        }
        None => {
            tracing::warn!("Interrupted, terminating benchmark binaries on every node");
            let binaries = experiment.binaries();
            runtime.block_on(cleanup_fleet(&config.fleet(), &config.workdir, &binaries));
            eprintln!(
                "Partial results ({} rows) in {}",
                writer.rows(),
                output.display()
            );
            Err(CliError::Interrupted)
        }
    }
}

fn report_partial<W: Write>(err: BenchError, writer: &ResultWriter<W>, output: &Path) -> CliError {
    if writer.rows() > 0 {
        eprintln!(
            "Partial results ({} rows) in {}",
            writer.rows(),
            output.display()
        );
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(experiment: ExperimentArg, payload_sizes: Vec<u32>, threads: Option<u32>) -> RunArgs {
        RunArgs {
            experiment,
            output: None,
            log_dir: None,
            payload_sizes,
            threads,
            dry_run: true,
        }
    }

    #[test]
    fn test_overrides_replace_sweep() {
        let mut config = BenchConfig::default();
        apply_overrides(&mut config, &args(ExperimentArg::TxOffload, vec![256, 512], Some(4)))
            .unwrap();
        assert_eq!(config.tx_offload.payload_sizes, vec![256, 512]);
        assert_eq!(config.tx_offload.threads, 4);
        assert_eq!(config.rx_cache, BenchConfig::default().rx_cache);
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let mut config = BenchConfig::default();
        apply_overrides(&mut config, &args(ExperimentArg::RxCache, Vec::new(), None)).unwrap();
        assert_eq!(config, BenchConfig::default());
    }

    #[test]
    fn test_solar_threads_pin_range() {
        let mut config = BenchConfig::default();
        apply_overrides(&mut config, &args(ExperimentArg::Solar, vec![2048], Some(6))).unwrap();
        assert_eq!(config.solar.payload_size, 2048);
        assert_eq!(config.solar.thread_start, 6);
        assert_eq!(config.solar.thread_end, 6);
    }

    #[test]
    fn test_solar_rejects_several_payloads() {
        let mut config = BenchConfig::default();
        let err = apply_overrides(&mut config, &args(ExperimentArg::Solar, vec![1, 2], None))
            .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_default_output_name() {
        let config = BenchConfig::default();
        let path = default_output(&config, "tx-offload");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("tx_offload_"));
        assert!(name.ends_with(".csv"));
        assert!(path.starts_with(&config.results_dir));
    }
}
