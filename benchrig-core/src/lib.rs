//! benchrig Core Library
//!
//! Orchestration of reproducible network and memory-bandwidth experiments
//! across a small fleet of hosts and DPUs.
//!
//! # Crate Structure
//!
//! - [`target`] / [`command`] - Where commands run and how they are built (local shell or SSH)
//! - [`process`] - Spawning, bounded waits, teardown and remote escalation
//! - [`metrics`] - Throughput extraction from benchmark output
//! - [`sampler`] - Hardware counter sampling (memory and LLC bandwidth)
//! - [`bandwidth`] - Active-window bandwidth estimation from sampler logs
//! - [`experiment`] - Experiment sweeps, run plans and CSV results
//! - [`results`] - Summaries of result CSVs
//! - [`config`] - TOML configuration
//! - [`tracing`] - Structured logging setup

#![warn(missing_docs)]

pub mod bandwidth;
pub mod command;
pub mod config;
pub mod error;
pub mod experiment;
pub mod metrics;
pub mod process;
pub mod results;
pub mod sampler;
pub mod target;
pub mod tracing;

pub use bandwidth::{
    ActiveSelection, ActiveWindowSettings, BandwidthSample, BandwidthSeries, BandwidthSummary,
    estimate, pick_active_indices,
};
pub use command::{CommandLine, shell_join, shell_quote};
pub use config::{BenchConfig, ConfigManager};
pub use error::{
    BenchError, BenchResult, ConfigError, ConfigResult, MetricError, ProcessError, ProcessResult,
    TelemetryError, TelemetryResult,
};
pub use experiment::{
    Experiment, ResultWriter, RunOutcome, RunPlan, RxCache, Solar, TxOffload, run_experiment,
};
pub use metrics::{MetricSpec, ThroughputPattern, extract_metric, extract_throughput};
pub use process::{ProcessHandle, ProcessMode, ProcessState, RunResult};
pub use results::{ResultKind, ResultSummary, summarize};
pub use sampler::{BandwidthTick, CounterLayout, SamplerHandle, SamplerSettings, start_sampler};
pub use target::{Target, is_local_host};

pub use crate::tracing::{
    TracingConfig, TracingError, TracingLevel, TracingOutput, TracingResult, init_tracing,
    span_names,
};
