//! Runs planned configurations against the fleet

use std::io::Write;
use std::path::Path;

use tracing::{Instrument, debug, info, info_span, warn};

use super::Experiment;
use super::plan::{Launch, RunPlan};
use super::record::ResultWriter;
use crate::bandwidth::{BandwidthSeries, BandwidthSummary, estimate};
use crate::config::BenchConfig;
use crate::error::{BenchResult, ConfigError};
use crate::metrics::extract_throughput;
use crate::process::{self, ProcessHandle, cleanup_fleet, graceful_stop_remote};
use crate::tracing::span_names;

/// Result of one successful configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOutcome {
    /// Headline metric reported by the key role
    pub metric: f64,
    /// Memory bandwidth summary when a sampler ran
    pub memory: Option<BandwidthSummary>,
}

/// Plans every case of `experiment`
///
/// # Errors
///
/// Returns the first planning error.
pub fn plan_all<E: Experiment>(
    experiment: &E,
    log_dir: &Path,
) -> BenchResult<Vec<(E::Case, RunPlan)>> {
    experiment
        .cases()
        .into_iter()
        .enumerate()
        .map(|(index, case)| {
            let plan = experiment.plan_case(&case, index, log_dir)?;
            Ok((case, plan))
        })
        .collect()
}

/// Runs every case of `experiment`, writing one row per successful run
///
/// The first failing configuration aborts the sweep after its teardown; rows
/// already written stay on disk. Returns the number of rows written.
///
/// # Errors
///
/// Returns the error of the failing configuration.
pub async fn run_experiment<E: Experiment, W: Write>(
    experiment: &E,
    config: &BenchConfig,
    log_dir: &Path,
    writer: &mut ResultWriter<W>,
) -> BenchResult<usize> {
    std::fs::create_dir_all(log_dir)?;
    let plans = plan_all(experiment, log_dir)?;
    info!(
        experiment = experiment.experiment_id(),
        runs = plans.len(),
        "Starting sweep"
    );

    for (case, plan) in &plans {
        let outcome = run_plan(plan, config).await?;
        writer.write_row(&experiment.row(case, plan, &outcome))?;
        info!(run_tag = %plan.run_tag, metric = outcome.metric, "Run complete");
    }
    Ok(writer.rows())
}

/// Executes one configuration: start, wait, extract, tear down
///
/// Teardown runs on every path, success or failure, before the error is
/// returned. The sampler log is summarized only after teardown.
///
/// # Errors
///
/// Returns spawn, timeout, non-zero exit and metric errors of the key role,
/// and telemetry errors of the sampler log.
pub async fn run_plan(plan: &RunPlan, config: &BenchConfig) -> BenchResult<RunOutcome> {
    let span = info_span!(span_names::EXPERIMENT_RUN, run_tag = %plan.run_tag, port = plan.port);
    async {
        let mut handles: Vec<Option<ProcessHandle>> = Vec::with_capacity(plan.roles.len());
        let result = execute(plan, config, &mut handles).await;
        teardown(plan, config, &mut handles).await;
        drop(handles);
        let metric = result?;

        let memory = match plan.sampler() {
            Some(role) => {
                let series = BandwidthSeries::from_log(&role.log_path)?;
                let summary = estimate(&series, &config.active_window)?;
                info!(
                    active_avg_total = summary.active_avg_total,
                    active = summary.active_count,
                    samples = summary.sample_count,
                    threshold = summary.threshold,
                    peak = summary.peak_total,
                    "Memory bandwidth"
                );
                Some(summary)
            }
            None => None,
        };

        Ok(RunOutcome { metric, memory })
    }
    .instrument(span)
    .await
}

async fn execute(
    plan: &RunPlan,
    config: &BenchConfig,
    handles: &mut Vec<Option<ProcessHandle>>,
) -> BenchResult<f64> {
    let workdir = config.workdir.as_path();
    let key_index = plan.key_index().ok_or_else(|| {
        ConfigError::Invalid(format!("run {} has no key role", plan.run_tag))
    })?;

    for role in &plan.roles {
        let handle = match role.launch {
            Launch::Key => process::start_captured(&role.target, workdir, &role.argv)?,
            Launch::Background | Launch::Sampler => {
                process::start_background(&role.target, workdir, &role.argv, &role.log_path)?
            }
        };
        debug!(role = role.role, node = role.node, launch = %role.launch, "Role started");
        handles.push(Some(handle));
        if !role.settle.is_zero() {
            tokio::time::sleep(role.settle).await;
        }
    }

    let key = &plan.roles[key_index];
    let Some(handle) = handles.get_mut(key_index).and_then(Option::as_mut) else {
        return Err(ConfigError::Invalid(format!("{} was not started", key.role)).into());
    };
    let result = process::wait(handle, plan.timeout, &key.log_path)
        .await?
        .ensure_success(&key.title(), &key.log_path)?;
    Ok(extract_throughput(&result.output, &plan.metric, &key.log_path)?)
}

/// Stops roles in reverse start order, then sweeps the run's nodes
async fn teardown(plan: &RunPlan, config: &BenchConfig, handles: &mut [Option<ProcessHandle>]) {
    let workdir = config.workdir.as_path();
    let wait = config.timing.stop_wait();

    for (index, role) in plan.roles.iter().enumerate().rev() {
        let handle = handles.get_mut(index).and_then(Option::as_mut);
        match role.launch {
            Launch::Background | Launch::Sampler => {
                graceful_stop_remote(&role.target, workdir, &role.binary, handle, wait).await;
            }
            Launch::Key => {
                if let Some(handle) = handle {
                    process::stop(handle).await;
                }
            }
        }
    }

    cleanup_fleet(&plan.cleanup_targets, workdir, &plan.cleanup_binaries).await;
    if handles.iter().flatten().any(ProcessHandle::is_running) {
        warn!(run_tag = %plan.run_tag, "A local process survived teardown");
    }
    tokio::time::sleep(config.timing.cleanup_delay()).await;
}
