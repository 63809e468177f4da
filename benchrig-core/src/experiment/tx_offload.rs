//! TX offload experiment
//!
//! Compares three transmit paths of the DPU relay. Per method and payload
//! size the server starts on `bf2`, the relay (key role) on `bf1` and the
//! client on `host1`; the relay reports aggregate throughput in Gbps.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::plan::{Launch, RolePlan, RunPlan, role_log_path, run_port};
use super::record::{fixed6, timestamp_utc};
use super::{Experiment, RunOutcome};
use crate::config::BenchConfig;
use crate::error::{BenchResult, ConfigError, ConfigResult};
use crate::metrics::{Aggregation, MetricSpec, ThroughputPattern};

/// Methods and their labels, in sweep order
pub const TX_METHODS: [(&str, &str); 3] = [
    ("arm_relay_1_1", "RDMA-assisted TX"),
    ("arm_relay_1_2", "DMA-assisted TX"),
    ("arm_relay_1_3", "Header-only Offloading TX"),
];

const THROUGHPUT_PATTERN: &str = r"throughput \[([0-9]+(?:\.[0-9]+)?)\] Gbps";

/// `[tx_offload]` settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOffloadSettings {
    /// Payload sizes in bytes, in sweep order
    #[serde(default = "default_payload_sizes")]
    pub payload_sizes: Vec<u32>,
    /// Worker threads per role
    #[serde(default = "default_threads")]
    pub threads: u32,
    /// Relay iterations
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    /// Batch size
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Outstanding requests
    #[serde(default = "default_outstanding")]
    pub outstanding: u32,
    /// Port of the first run
    #[serde(default = "default_port_base")]
    pub port_base: u16,
    /// Data-plane address the client connects to
    #[serde(default = "default_server_ip")]
    pub server_ip: String,
    /// RDMA device on the hosts
    #[serde(default = "default_host_device")]
    pub host_device: String,
    /// RDMA device on the DPUs
    #[serde(default = "default_bf_device")]
    pub bf_device: String,
}

fn default_payload_sizes() -> Vec<u32> {
    vec![128, 256, 512, 1024, 2048, 4096, 8192]
}

const fn default_threads() -> u32 {
    2
}

const fn default_iterations() -> u64 {
    10_000
}

pub(super) const fn default_batch_size() -> u32 {
    1
}

pub(super) const fn default_outstanding() -> u32 {
    32
}

const fn default_port_base() -> u16 {
    40_000
}

fn default_server_ip() -> String {
    "10.0.0.101".to_string()
}

pub(super) fn default_host_device() -> String {
    "mlx5_0".to_string()
}

pub(super) fn default_bf_device() -> String {
    "mlx5_2".to_string()
}

impl Default for TxOffloadSettings {
    fn default() -> Self {
        Self {
            payload_sizes: default_payload_sizes(),
            threads: default_threads(),
            iterations: default_iterations(),
            batch_size: default_batch_size(),
            outstanding: default_outstanding(),
            port_base: default_port_base(),
            server_ip: default_server_ip(),
            host_device: default_host_device(),
            bf_device: default_bf_device(),
        }
    }
}

impl TxOffloadSettings {
    /// Checks that the sweep is non-empty and fits the port range
    ///
    /// # Errors
    ///
    /// Returns `Invalid` describing the problem.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.payload_sizes.is_empty() {
            return Err(ConfigError::Invalid(
                "tx_offload.payload_sizes must not be empty".to_string(),
            ));
        }
        if self.threads == 0 {
            return Err(ConfigError::Invalid(
                "tx_offload.threads must be positive".to_string(),
            ));
        }
        let runs = TX_METHODS.len() * self.payload_sizes.len();
        if run_port(self.port_base, runs - 1).is_none() {
            return Err(ConfigError::Invalid(format!(
                "tx_offload.port_base {} leaves no room for {runs} runs",
                self.port_base
            )));
        }
        Ok(())
    }
}

/// One point of the TX sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxCase {
    /// Binary name of the method
    pub method: &'static str,
    /// Label of the method
    pub label: &'static str,
    /// Payload size in bytes
    pub payload_size: u32,
}

/// TX offload experiment bound to a configuration
pub struct TxOffload<'a> {
    config: &'a BenchConfig,
}

impl<'a> TxOffload<'a> {
    /// Creates the experiment
    #[must_use]
    pub const fn new(config: &'a BenchConfig) -> Self {
        Self { config }
    }

    const fn settings(&self) -> &TxOffloadSettings {
        &self.config.tx_offload
    }
}

impl Experiment for TxOffload<'_> {
    type Case = TxCase;

    fn experiment_id(&self) -> &'static str {
        "tx-offload"
    }

    fn display_name(&self) -> &'static str {
        "Header-only Offloading TX Path"
    }

    fn header(&self) -> Vec<&'static str> {
        vec![
            "timestamp_utc",
            "method",
            "method_label",
            "payload_size",
            "threads",
            "total_gbps",
            "relay_log",
            "server_log",
            "client_log",
        ]
    }

    fn cases(&self) -> Vec<TxCase> {
        TX_METHODS
            .iter()
            .flat_map(|&(method, label)| {
                self.settings()
                    .payload_sizes
                    .iter()
                    .map(move |&payload_size| TxCase {
                        method,
                        label,
                        payload_size,
                    })
            })
            .collect()
    }

    fn plan_case(&self, case: &TxCase, index: usize, log_dir: &Path) -> BenchResult<RunPlan> {
        let s = self.settings();
        let timing = &self.config.timing;
        let port = run_port(s.port_base, index).ok_or_else(|| {
            ConfigError::Invalid(format!("port range exhausted at run {index}"))
        })?;
        let run_tag = format!("{}_payload{}_run{index}", case.method, case.payload_size);

        let dpu_binary = format!("./build_dpu/{}", case.method);
        let common = vec![
            "-deviceName".to_string(),
            s.bf_device.clone(),
            "-batch_size".to_string(),
            s.batch_size.to_string(),
            "-outstanding".to_string(),
            s.outstanding.to_string(),
            "-threads".to_string(),
            s.threads.to_string(),
            "-payload_size".to_string(),
            case.payload_size.to_string(),
            "-port".to_string(),
            port.to_string(),
        ];

        let mut server = vec![dpu_binary.clone()];
        server.extend(common.iter().cloned());
        server.extend([
            "-nodeType".to_string(),
            "2".to_string(),
            "-auto_exit_sec".to_string(),
            timing.auto_exit_secs.to_string(),
        ]);

        let mut relay = vec![dpu_binary];
        relay.extend(common);
        relay.extend([
            "-nodeType".to_string(),
            "1".to_string(),
            "-iterations".to_string(),
            s.iterations.to_string(),
        ]);

        let client = vec![
            format!("./build_host/{}", case.method),
            "-deviceName".to_string(),
            s.host_device.clone(),
            "-batch_size".to_string(),
            s.batch_size.to_string(),
            "-outstanding".to_string(),
            s.outstanding.to_string(),
            "-threads".to_string(),
            s.threads.to_string(),
            "-payload_size".to_string(),
            case.payload_size.to_string(),
            "-port".to_string(),
            port.to_string(),
            "-nodeType".to_string(),
            "0".to_string(),
            "-serverIp".to_string(),
            s.server_ip.clone(),
            "-auto_exit_sec".to_string(),
            timing.auto_exit_secs.to_string(),
        ];

        let role = |role: &'static str,
                    node: &'static str,
                    argv: Vec<String>,
                    launch: Launch,
                    settle: Duration|
         -> BenchResult<RolePlan> {
            Ok(RolePlan {
                role,
                node,
                target: self.config.node_target(node)?,
                argv,
                log_path: role_log_path(log_dir, &run_tag, node, role),
                launch,
                binary: case.method.to_string(),
                settle,
            })
        };

        let roles = vec![
            role("server", "bf2", server, Launch::Background, timing.startup_delay())?,
            role("relay", "bf1", relay, Launch::Key, timing.startup_delay())?,
            role("client", "host1", client, Launch::Background, Duration::ZERO)?,
        ];

        Ok(RunPlan {
            run_tag,
            index,
            port,
            roles,
            timeout: timing.run_timeout(),
            metric: MetricSpec::new("total_gbps")
                .with_fallback(ThroughputPattern::new(THROUGHPUT_PATTERN, Aggregation::Sum)?),
            cleanup_targets: vec![
                self.config.node_target("host1")?,
                self.config.node_target("bf1")?,
                self.config.node_target("bf2")?,
            ],
            cleanup_binaries: vec![case.method.to_string()],
        })
    }

    fn row(&self, case: &TxCase, plan: &RunPlan, outcome: &RunOutcome) -> Vec<String> {
        let log = |role: &str| {
            plan.log_of(role)
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        vec![
            timestamp_utc(),
            case.method.to_string(),
            case.label.to_string(),
            case.payload_size.to_string(),
            self.settings().threads.to_string(),
            fixed6(outcome.metric),
            log("relay"),
            log("server"),
            log("client"),
        ]
    }

    fn binaries(&self) -> Vec<String> {
        TX_METHODS.iter().map(|(m, _)| (*m).to_string()).collect()
    }
}
