//! CLI argument parsing types using `clap`.

use std::path::PathBuf;

use benchrig_core::ResultKind;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// benchrig command-line interface for DPU offload experiments
#[derive(Parser)]
#[command(name = "benchrig")]
#[command(author, version, about = "Orchestrates DPU offload experiments across hosts and DPUs")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "BENCHRIG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run an experiment sweep
    #[command(about = "Run an experiment sweep and write its result CSV")]
    Run(RunArgs),

    /// Run one command on a node
    #[command(about = "Run a command on a node, capture its output and exit with its code")]
    Exec(ExecArgs),

    /// Stop binaries on a node
    #[command(about = "Stop binaries on a node, escalating SIGINT, SIGTERM, SIGKILL")]
    Stop {
        /// Node name from [nodes] or a literal host
        #[arg(short = 'H', long)]
        host: String,

        /// Binaries to stop (matched against full command lines)
        #[arg(required = true)]
        binaries: Vec<String>,

        /// Seconds to wait after each signal (default: timing.stop_wait_secs)
        #[arg(short, long)]
        wait: Option<f64>,
    },

    /// Terminate leftover benchmark processes on every node
    #[command(about = "Send SIGTERM to benchmark binaries on every configured node")]
    Cleanup {
        /// Binaries to terminate (default: every experiment binary)
        binaries: Vec<String>,
    },

    /// Estimate memory bandwidth from a sampler log
    #[command(about = "Summarize a bwmon log with the active-window estimator")]
    Estimate {
        /// Sampler log file
        log: PathBuf,

        /// Fraction of the peak that counts as active
        #[arg(long)]
        ratio: Option<f64>,

        /// Lower bound of the activity threshold in MB/s
        #[arg(long)]
        floor: Option<f64>,

        /// Minimum number of active samples
        #[arg(long)]
        min_samples: Option<usize>,

        /// Treat every sample as active
        #[arg(long)]
        all_samples: bool,

        /// Output format
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Summarize a result CSV
    #[command(about = "Average repeated runs of a result CSV per label and x-value")]
    Summarize {
        /// Result CSV written by `run`
        csv: PathBuf,

        /// Experiment that produced the file
        #[arg(short, long, value_enum)]
        experiment: ExperimentArg,

        /// Output format
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Generate shell completions
    #[command(about = "Generate shell completions for bash, zsh, fish, etc.")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments of `run`
#[derive(Args)]
pub struct RunArgs {
    /// Experiment to run
    #[arg(value_enum)]
    pub experiment: ExperimentArg,

    /// Result CSV (default: <results_dir>/<experiment>_<timestamp>.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for per-process logs (default: <results_dir>/logs)
    #[arg(short, long)]
    pub log_dir: Option<PathBuf>,

    /// Comma-separated payload sizes, replacing the configured ones
    #[arg(long, value_delimiter = ',')]
    pub payload_sizes: Vec<u32>,

    /// Thread count (solar: run only this thread count)
    #[arg(short, long)]
    pub threads: Option<u32>,

    /// Print every planned command without running anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments of `exec`
#[derive(Args)]
pub struct ExecArgs {
    /// Node name from [nodes] or a literal host
    #[arg(short = 'H', long)]
    pub host: String,

    /// SSH user (default: ssh.user)
    #[arg(short, long)]
    pub user: Option<String>,

    /// SSH port (default: ssh.port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// SSH identity file (default: ssh.identity_file)
    #[arg(short, long)]
    pub identity: Option<PathBuf>,

    /// Run through `sudo -n`
    #[arg(long, conflicts_with = "no_sudo")]
    pub sudo: bool,

    /// Never elevate
    #[arg(long)]
    pub no_sudo: bool,

    /// Working directory on the node (default: workdir)
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    /// Timeout in seconds (default: timing.run_timeout_secs)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// File receiving the captured output
    #[arg(short, long)]
    pub log: Option<PathBuf>,

    /// Command and its arguments
    #[arg(last = true, required = true)]
    pub argv: Vec<String>,
}

/// Experiment selector
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExperimentArg {
    /// Header-only offloading on the TX path
    #[value(alias = "tx", alias = "exp1")]
    TxOffload,
    /// RX path working set and cache residency
    #[value(alias = "rx", alias = "exp2")]
    RxCache,
    /// Solar storage offload
    #[value(alias = "exp4")]
    Solar,
}

impl From<ExperimentArg> for ResultKind {
    fn from(arg: ExperimentArg) -> Self {
        match arg {
            ExperimentArg::TxOffload => Self::TxOffload,
            ExperimentArg::RxCache => Self::RxCache,
            ExperimentArg::Solar => Self::Solar,
        }
    }
}

/// Output format options
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Display as formatted table
    Table,
    /// Output as JSON
    Json,
}
