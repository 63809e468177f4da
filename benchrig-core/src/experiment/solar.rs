//! Solar storage benchmark
//!
//! Sweeps offload type against thread count. The server runs on `host2` in
//! the background and the client on `host1` is the key role reporting Mops.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::plan::{Launch, RolePlan, RunPlan, role_log_path, run_port};
use super::record::{fixed6, timestamp_utc};
use super::tx_offload::default_host_device;
use super::{Experiment, RunOutcome};
use crate::config::BenchConfig;
use crate::error::{BenchResult, ConfigError, ConfigResult};
use crate::metrics::{Aggregation, MetricSpec, ThroughputPattern};

/// Benchmark binary name
pub const SOLAR_BINARY: &str = "solar_bench";

/// Supported `-type` values and their labels
pub const SOLAR_TYPES: [(u32, &str); 3] = [
    (0, "CPU-only"),
    (1, "CPU+CRC offload"),
    (2, "CPU+CRC offload+DSA"),
];

const SPEED_PATTERN: &str = r"Total Speed:\s*([0-9]+(?:\.[0-9]+)?)\s*Mops";

fn type_label(kind: u32) -> Option<&'static str> {
    SOLAR_TYPES
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, label)| *label)
}

/// `[solar]` settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolarSettings {
    /// Offload types to sweep
    #[serde(default = "default_types")]
    pub types: Vec<u32>,
    /// First thread count
    #[serde(default = "default_thread_start")]
    pub thread_start: u32,
    /// Last thread count (inclusive)
    #[serde(default = "default_thread_end")]
    pub thread_end: u32,
    /// Iterations per run
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    /// Packets per iteration
    #[serde(default = "default_num_pack")]
    pub num_pack: u64,
    /// Payload size in bytes
    #[serde(default = "default_payload_size")]
    pub payload_size: u32,
    /// Port of the first run
    #[serde(default = "default_port_base")]
    pub port_base: u16,
    /// Data-plane address of the server
    #[serde(default = "default_server_ip")]
    pub server_ip: String,
    /// RDMA device on the hosts
    #[serde(default = "default_host_device")]
    pub host_device: String,
}

fn default_types() -> Vec<u32> {
    SOLAR_TYPES.iter().map(|(k, _)| *k).collect()
}

const fn default_thread_start() -> u32 {
    1
}

const fn default_thread_end() -> u32 {
    12
}

const fn default_iterations() -> u64 {
    100
}

const fn default_num_pack() -> u64 {
    51_200
}

const fn default_payload_size() -> u32 {
    4096
}

const fn default_port_base() -> u16 {
    42_000
}

fn default_server_ip() -> String {
    "10.0.0.200".to_string()
}

impl Default for SolarSettings {
    fn default() -> Self {
        Self {
            types: default_types(),
            thread_start: default_thread_start(),
            thread_end: default_thread_end(),
            iterations: default_iterations(),
            num_pack: default_num_pack(),
            payload_size: default_payload_size(),
            port_base: default_port_base(),
            server_ip: default_server_ip(),
            host_device: default_host_device(),
        }
    }
}

impl SolarSettings {
    /// Thread counts in sweep order
    pub fn thread_counts(&self) -> impl Iterator<Item = u32> {
        self.thread_start..=self.thread_end
    }

    /// Checks types, thread range and port range
    ///
    /// # Errors
    ///
    /// Returns `Invalid` describing the problem.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.types.is_empty() {
            return Err(ConfigError::Invalid("solar.types must not be empty".to_string()));
        }
        if let Some(kind) = self.types.iter().find(|k| type_label(**k).is_none()) {
            return Err(ConfigError::Invalid(format!("Unsupported solar type: {kind}")));
        }
        if self.thread_start == 0 || self.thread_start > self.thread_end {
            return Err(ConfigError::Invalid(format!(
                "solar thread range {}..={} is empty",
                self.thread_start, self.thread_end
            )));
        }
        let runs = self.types.len() * self.thread_counts().count();
        if run_port(self.port_base, runs - 1).is_none() {
            return Err(ConfigError::Invalid(format!(
                "solar.port_base {} leaves no room for {runs} runs",
                self.port_base
            )));
        }
        Ok(())
    }
}

/// One point of the Solar sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolarCase {
    /// `-type` value
    pub kind: u32,
    /// Label of the type
    pub label: &'static str,
    /// Thread count
    pub threads: u32,
}

/// Solar experiment bound to a configuration
pub struct Solar<'a> {
    config: &'a BenchConfig,
}

impl<'a> Solar<'a> {
    /// Creates the experiment
    #[must_use]
    pub const fn new(config: &'a BenchConfig) -> Self {
        Self { config }
    }

    const fn settings(&self) -> &SolarSettings {
        &self.config.solar
    }
}

impl Experiment for Solar<'_> {
    type Case = SolarCase;

    fn experiment_id(&self) -> &'static str {
        "solar"
    }

    fn display_name(&self) -> &'static str {
        "Solar storage offload"
    }

    fn header(&self) -> Vec<&'static str> {
        vec![
            "timestamp_utc",
            "type",
            "type_label",
            "threads",
            "payload_size",
            "total_mops",
            "client_log",
            "server_log",
        ]
    }

    /// Unknown types are skipped here; `validate` rejects them up front
    fn cases(&self) -> Vec<SolarCase> {
        let s = self.settings();
        s.types
            .iter()
            .filter_map(|&kind| type_label(kind).map(|label| (kind, label)))
            .flat_map(|(kind, label)| {
                s.thread_counts()
                    .map(move |threads| SolarCase { kind, label, threads })
            })
            .collect()
    }

    fn plan_case(&self, case: &SolarCase, index: usize, log_dir: &Path) -> BenchResult<RunPlan> {
        let s = self.settings();
        let timing = &self.config.timing;
        let port = run_port(s.port_base, index).ok_or_else(|| {
            ConfigError::Invalid(format!("port range exhausted at run {index}"))
        })?;
        let run_tag = format!("type{}_threads{}_run{index}", case.kind, case.threads);

        let tail = [
            "-iterations".to_string(),
            s.iterations.to_string(),
            "-numPack".to_string(),
            s.num_pack.to_string(),
            "-payload_size".to_string(),
            s.payload_size.to_string(),
            "-threads".to_string(),
            case.threads.to_string(),
            "-type".to_string(),
            case.kind.to_string(),
            "-port".to_string(),
            port.to_string(),
        ];
        let program = format!("./build_host/{SOLAR_BINARY}");

        let mut server = vec![
            program.clone(),
            "-deviceName".to_string(),
            s.host_device.clone(),
            "-is_server".to_string(),
        ];
        server.extend(tail.iter().cloned());

        let mut client = vec![
            program,
            "-deviceName".to_string(),
            s.host_device.clone(),
            "-serverIp".to_string(),
            s.server_ip.clone(),
        ];
        client.extend(tail);

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
                binary: SOLAR_BINARY.to_string(),
                settle,
            })
        };

        let roles = vec![
            role("server", "host2", server, Launch::Background, timing.startup_delay())?,
            role("client", "host1", client, Launch::Key, Duration::ZERO)?,
        ];

        Ok(RunPlan {
            run_tag,
            index,
            port,
            roles,
            timeout: timing.run_timeout(),
            metric: MetricSpec::new("total_mops")
                .with_fallback(ThroughputPattern::new(SPEED_PATTERN, Aggregation::First)?),
            cleanup_targets: vec![
                self.config.node_target("host1")?,
                self.config.node_target("host2")?,
            ],
            cleanup_binaries: vec![SOLAR_BINARY.to_string()],
        })
    }

    fn row(&self, case: &SolarCase, plan: &RunPlan, outcome: &RunOutcome) -> Vec<String> {
        let log = |role: &str| {
            plan.log_of(role)
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        vec![
            timestamp_utc(),
            case.kind.to_string(),
            case.label.to_string(),
            case.threads.to_string(),
            self.settings().payload_size.to_string(),
            fixed6(outcome.metric),
            log("client"),
            log("server"),
        ]
    }

    fn binaries(&self) -> Vec<String> {
        vec![SOLAR_BINARY.to_string()]
    }
}
