//! RX cache experiment
//!
//! Compares three receive paths while sampling Arm memory bandwidth on the
//! receiving DPU. Per method and payload size an optional memory sampler
//! starts first on `bf2`, then the relay (key role) on `bf2`, the server on
//! `host2` and the client on `bf1`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::plan::{Launch, RolePlan, RunPlan, role_log_path, run_port};
use super::record::{MEMORY_COLUMNS, fixed6, memory_cells, timestamp_utc};
use super::tx_offload::{
    default_batch_size, default_bf_device, default_host_device, default_outstanding,
};
use super::{Experiment, RunOutcome};
use crate::config::BenchConfig;
use crate::error::{BenchResult, ConfigError, ConfigResult};
use crate::metrics::{Aggregation, MetricSpec, ThroughputPattern};

/// Methods and their labels, in sweep order
pub const RX_METHODS: [(&str, &str); 3] = [
    ("rx_rdma_assisted", "RDMA-assisted RX"),
    ("rx_dma_assisted", "DMA-assisted RX"),
    (
        "rx_unlimited_working_set_in_cache",
        "Unlimited-working-set In-Cache RX",
    ),
];

const RECV_PATTERN: &str = r"recv speed \[([0-9]+(?:\.[0-9]+)?)\] Gbps";

/// `[rx_cache]` settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RxCacheSettings {
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
    /// Data-plane address of the server
    #[serde(default = "default_server_ip")]
    pub server_ip: String,
    /// RDMA device on the hosts
    #[serde(default = "default_host_device")]
    pub host_device: String,
    /// RDMA device on the DPUs
    #[serde(default = "default_bf_device")]
    pub bf_device: String,
    /// Sample Arm memory bandwidth on `bf2` during each run
    #[serde(default = "default_collect_memory")]
    pub collect_memory: bool,
    /// Receive descriptors per thread built into the RX binaries, recorded
    /// so the working set can be derived from the results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nb_rxd: Option<u64>,
}

fn default_payload_sizes() -> Vec<u32> {
    vec![512, 1024, 2048, 4096, 8192]
}

const fn default_threads() -> u32 {
    8
}

const fn default_iterations() -> u64 {
    1000
}

const fn default_port_base() -> u16 {
    41_000
}

fn default_server_ip() -> String {
    "10.0.0.201".to_string()
}

const fn default_collect_memory() -> bool {
    true
}

impl Default for RxCacheSettings {
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
            collect_memory: default_collect_memory(),
            nb_rxd: None,
        }
    }
}

impl RxCacheSettings {
    /// Checks that the sweep is non-empty and fits the port range
    ///
    /// # Errors
    ///
    /// Returns `Invalid` describing the problem.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.payload_sizes.is_empty() {
            return Err(ConfigError::Invalid(
                "rx_cache.payload_sizes must not be empty".to_string(),
            ));
        }
        if self.threads == 0 {
            return Err(ConfigError::Invalid(
                "rx_cache.threads must be positive".to_string(),
            ));
        }
        let runs = RX_METHODS.len() * self.payload_sizes.len();
        if run_port(self.port_base, runs - 1).is_none() {
            return Err(ConfigError::Invalid(format!(
                "rx_cache.port_base {} leaves no room for {runs} runs",
                self.port_base
            )));
        }
        Ok(())
    }

    /// Working set in bytes for `payload_size`, when `nb_rxd` is known
    #[must_use]
    pub fn working_set_size(&self, payload_size: u32) -> Option<u64> {
        self.nb_rxd
            .map(|n| n * u64::from(payload_size) * u64::from(self.threads))
    }
}

/// One point of the RX sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxCase {
    /// Binary name of the method
    pub method: &'static str,
    /// Label of the method
    pub label: &'static str,
    /// Payload size in bytes
    pub payload_size: u32,
}

/// RX cache experiment bound to a configuration
pub struct RxCache<'a> {
    config: &'a BenchConfig,
}

impl<'a> RxCache<'a> {
    /// Creates the experiment
    #[must_use]
    pub const fn new(config: &'a BenchConfig) -> Self {
        Self { config }
    }

    const fn settings(&self) -> &RxCacheSettings {
        &self.config.rx_cache
    }

    /// Name `pkill -f` matches for the sampler
    fn sampler_binary(&self) -> String {
        let binary = &self.config.sampler.binary;
        Path::new(binary)
            .file_name()
            .map_or_else(|| binary.clone(), |name| name.to_string_lossy().into_owned())
    }

    fn sampler_argv(&self) -> Vec<String> {
        let sampler = &self.config.sampler;
        vec![
            sampler.binary.clone(),
            "memory".to_string(),
            "--root".to_string(),
            sampler.hwmon_root.display().to_string(),
            "--device".to_string(),
            sampler.device.clone(),
            "--interval-ms".to_string(),
            sampler.interval_ms.to_string(),
            "--width".to_string(),
            sampler.counter_width.bits().to_string(),
            "--bytes-per-event".to_string(),
            sampler.bytes_per_event.to_string(),
        ]
    }
}

impl Experiment for RxCache<'_> {
    type Case = RxCase;

    fn experiment_id(&self) -> &'static str {
        "rx-cache"
    }

    fn display_name(&self) -> &'static str {
        "Unlimited-working-set In-Cache Processing RX Path"
    }

    fn header(&self) -> Vec<&'static str> {
        let mut header = vec![
            "timestamp_utc",
            "method",
            "method_label",
            "payload_size",
            "threads",
            "total_gbps",
        ];
        header.extend(MEMORY_COLUMNS);
        header.extend([
            "relay_log",
            "server_log",
            "client_log",
            "memory_log",
            "nb_rxd",
            "working_set_size",
        ]);
        header
    }

    fn cases(&self) -> Vec<RxCase> {
        RX_METHODS
            .iter()
            .flat_map(|&(method, label)| {
                self.settings()
                    .payload_sizes
                    .iter()
                    .map(move |&payload_size| RxCase {
                        method,
                        label,
                        payload_size,
                    })
            })
            .collect()
    }

    fn plan_case(&self, case: &RxCase, index: usize, log_dir: &Path) -> BenchResult<RunPlan> {
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

        let mut relay = vec![dpu_binary.clone()];
        relay.extend(common.iter().cloned());
        relay.extend([
            "-nodeType".to_string(),
            "1".to_string(),
            "-iterations".to_string(),
            s.iterations.to_string(),
        ]);

        let server = vec![
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
            "2".to_string(),
            "-serverIp".to_string(),
            s.server_ip.clone(),
            "-auto_exit_sec".to_string(),
            timing.auto_exit_secs.to_string(),
        ];

        let mut client = vec![dpu_binary];
        client.extend(common);
        client.extend([
            "-nodeType".to_string(),
            "0".to_string(),
            "-auto_exit_sec".to_string(),
            timing.auto_exit_secs.to_string(),
        ]);

        let role = |role: &'static str,
                    node: &'static str,
                    argv: Vec<String>,
                    launch: Launch,
                    binary: String,
                    settle: Duration|
         -> BenchResult<RolePlan> {
            Ok(RolePlan {
                role,
                node,
                target: self.config.node_target(node)?,
                argv,
                log_path: role_log_path(log_dir, &run_tag, node, role),
                launch,
                binary,
                settle,
            })
        };

        let method = case.method.to_string();
        let mut roles = Vec::with_capacity(4);
        if s.collect_memory {
            roles.push(role(
                "memory",
                "bf2",
                self.sampler_argv(),
                Launch::Sampler,
                self.sampler_binary(),
                timing.sampler_start_delay(),
            )?);
        }
        roles.push(role(
            "relay",
            "bf2",
            relay,
            Launch::Key,
            method.clone(),
            timing.startup_delay(),
        )?);
        roles.push(role(
            "server",
            "host2",
            server,
            Launch::Background,
            method.clone(),
            timing.startup_delay(),
        )?);
        roles.push(role(
            "client",
            "bf1",
            client,
            Launch::Background,
            method.clone(),
            Duration::ZERO,
        )?);

        Ok(RunPlan {
            run_tag,
            index,
            port,
            roles,
            timeout: timing.run_timeout(),
            metric: MetricSpec::new("total_gbps")
                .with_fallback(ThroughputPattern::new(RECV_PATTERN, Aggregation::Sum)?),
            cleanup_targets: vec![
                self.config.node_target("bf1")?,
                self.config.node_target("bf2")?,
                self.config.node_target("host2")?,
            ],
            cleanup_binaries: vec![method],
        })
    }

    fn row(&self, case: &RxCase, plan: &RunPlan, outcome: &RunOutcome) -> Vec<String> {
        let log = |role: &str| {
            plan.log_of(role)
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        let s = self.settings();

        let mut row = vec![
            timestamp_utc(),
            case.method.to_string(),
            case.label.to_string(),
            case.payload_size.to_string(),
            s.threads.to_string(),
            fixed6(outcome.metric),
        ];
        row.extend(memory_cells(outcome.memory.as_ref()));
        row.extend([
            log("relay"),
            log("server"),
            log("client"),
            // only recorded when a summary was produced
            if outcome.memory.is_some() {
                log("memory")
            } else {
                String::new()
            },
            s.nb_rxd.map(|n| n.to_string()).unwrap_or_default(),
            s.working_set_size(case.payload_size)
                .map(|n| n.to_string())
                .unwrap_or_default(),
        ]);
        row
    }

    fn binaries(&self) -> Vec<String> {
        let mut binaries: Vec<String> = RX_METHODS.iter().map(|(m, _)| (*m).to_string()).collect();
        binaries.push(self.sampler_binary());
        binaries
    }
}
