//! Settings structures stored in `config.toml`

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bandwidth::ActiveWindowSettings;
use crate::error::{ConfigError, ConfigResult};
use crate::experiment::{RxCacheSettings, SolarSettings, TxOffloadSettings};
use crate::sampler::{CounterWidth, SamplerSettings};
use crate::target::{DEFAULT_SSH_PORT, Target};

/// SSH options shared by every node (`[ssh]`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshSettings {
    /// Login user
    #[serde(default = "default_user")]
    pub user: String,
    /// Identity file; `~` is expanded when the command is built
    #[serde(default = "default_identity_file")]
    pub identity_file: Option<PathBuf>,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Run benchmark commands through `sudo -n`
    #[serde(default = "default_true")]
    pub elevate: bool,
}

fn default_user() -> String {
    "eurosys26".to_string()
}

fn default_identity_file() -> Option<PathBuf> {
    Some(PathBuf::from("eurosys26_id_ed25519"))
}

const fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

const fn default_true() -> bool {
    true
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: default_user(),
            identity_file: default_identity_file(),
            port: default_port(),
            elevate: true,
        }
    }
}

/// Node addresses of the testbed (`[nodes]`)
///
/// `host1`/`host2` are the x86 hosts, `bf1`/`bf2` the BlueField DPUs. An
/// empty address or a local alias runs that node's roles locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSettings {
    /// First host
    #[serde(default = "default_host1")]
    pub host1: String,
    /// Second host
    #[serde(default = "default_host2")]
    pub host2: String,
    /// DPU of the first host
    #[serde(default = "default_bf1")]
    pub bf1: String,
    /// DPU of the second host
    #[serde(default = "default_bf2")]
    pub bf2: String,
}

fn default_host1() -> String {
    "10.130.142.26".to_string()
}

fn default_host2() -> String {
    "10.130.142.27".to_string()
}

fn default_bf1() -> String {
    "10.130.142.40".to_string()
}

fn default_bf2() -> String {
    "10.130.142.41".to_string()
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            host1: default_host1(),
            host2: default_host2(),
            bf1: default_bf1(),
            bf2: default_bf2(),
        }
    }
}

impl NodeSettings {
    /// Node names in a fixed order
    pub const NAMES: [&'static str; 4] = ["host1", "host2", "bf1", "bf2"];

    /// Address of a named node
    #[must_use]
    pub fn address(&self, name: &str) -> Option<&str> {
        match name {
            "host1" => Some(&self.host1),
            "host2" => Some(&self.host2),
            "bf1" => Some(&self.bf1),
            "bf2" => Some(&self.bf2),
            _ => None,
        }
    }
}

/// Delays and bounds of the orchestration protocol (`[timing]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSettings {
    /// Pause between starting consecutive roles (default: 3 s)
    #[serde(default = "default_startup_delay")]
    pub startup_delay_secs: f64,
    /// Pause after tearing a configuration down (default: 1 s)
    #[serde(default = "default_cleanup_delay")]
    pub cleanup_delay_secs: f64,
    /// Wait after each escalation signal (default: 6 s)
    #[serde(default = "default_stop_wait")]
    pub stop_wait_secs: f64,
    /// Bound on the key role of a configuration (default: 600 s)
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
    /// Self-termination bound passed to non-key roles (default: 360 s)
    #[serde(default = "default_auto_exit")]
    pub auto_exit_secs: u64,
    /// Pause after starting a sampler (default: 2 s)
    #[serde(default = "default_sampler_start_delay")]
    pub sampler_start_delay_secs: f64,
}

const fn default_startup_delay() -> f64 {
    3.0
}

const fn default_cleanup_delay() -> f64 {
    1.0
}

const fn default_stop_wait() -> f64 {
    6.0
}

const fn default_run_timeout() -> u64 {
    600
}

const fn default_auto_exit() -> u64 {
    360
}

const fn default_sampler_start_delay() -> f64 {
    2.0
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            startup_delay_secs: default_startup_delay(),
            cleanup_delay_secs: default_cleanup_delay(),
            stop_wait_secs: default_stop_wait(),
            run_timeout_secs: default_run_timeout(),
            auto_exit_secs: default_auto_exit(),
            sampler_start_delay_secs: default_sampler_start_delay(),
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl TimingSettings {
    /// Pause between roles
    #[must_use]
    pub fn startup_delay(&self) -> Duration {
        secs(self.startup_delay_secs)
    }

    /// Pause after teardown
    #[must_use]
    pub fn cleanup_delay(&self) -> Duration {
        secs(self.cleanup_delay_secs)
    }

    /// Escalation wait
    #[must_use]
    pub fn stop_wait(&self) -> Duration {
        secs(self.stop_wait_secs)
    }

    /// Key role bound
    #[must_use]
    pub const fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    /// Pause after starting a sampler
    #[must_use]
    pub fn sampler_start_delay(&self) -> Duration {
        secs(self.sampler_start_delay_secs)
    }
}

/// Complete benchrig configuration
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Checkout of the benchmark sources, at the same path on every node
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,
    /// Where result CSVs and log directories go by default
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    /// SSH options
    #[serde(default)]
    pub ssh: SshSettings,
    /// Node addresses
    #[serde(default)]
    pub nodes: NodeSettings,
    /// Delays and bounds
    #[serde(default)]
    pub timing: TimingSettings,
    /// Memory bandwidth estimator
    #[serde(default)]
    pub active_window: ActiveWindowSettings,
    /// Counter sampler
    #[serde(default)]
    pub sampler: SamplerSettings,
    /// TX offload experiment
    #[serde(default)]
    pub tx_offload: TxOffloadSettings,
    /// RX cache experiment
    #[serde(default)]
    pub rx_cache: RxCacheSettings,
    /// Solar experiment
    #[serde(default)]
    pub solar: SolarSettings,
}

fn default_workdir() -> PathBuf {
    PathBuf::from(".")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("test/results")
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            workdir: default_workdir(),
            results_dir: default_results_dir(),
            ssh: SshSettings::default(),
            nodes: NodeSettings::default(),
            timing: TimingSettings::default(),
            active_window: ActiveWindowSettings::default(),
            sampler: SamplerSettings::default(),
            tx_offload: TxOffloadSettings::default(),
            rx_cache: RxCacheSettings::default(),
            solar: SolarSettings::default(),
        }
    }
}

impl BenchConfig {
    /// Builds the target for an arbitrary host with the shared SSH options
    #[must_use]
    pub fn target_for_host(&self, host: &str) -> Target {
        let mut target = Target::new(host)
            .with_user(self.ssh.user.clone())
            .with_port(self.ssh.port)
            .with_elevate(self.ssh.elevate);
        if let Some(ref key) = self.ssh.identity_file {
            target = target.with_identity_file(key.clone());
        }
        target
    }

    /// Builds the target of a named node
    ///
    /// # Errors
    ///
    /// Returns `Invalid` if `name` is not one of [`NodeSettings::NAMES`].
    pub fn node_target(&self, name: &str) -> ConfigResult<Target> {
        self.nodes
            .address(name)
            .map(|address| self.target_for_host(address))
            .ok_or_else(|| ConfigError::Invalid(format!("unknown node '{name}'")))
    }

    /// Resolves a node name, or treats `host` as a literal address
    #[must_use]
    pub fn resolve_host(&self, host: &str) -> Target {
        self.node_target(host)
            .unwrap_or_else(|_| self.target_for_host(host))
    }

    /// Targets of every node
    #[must_use]
    pub fn fleet(&self) -> Vec<Target> {
        NodeSettings::NAMES
            .iter()
            .filter_map(|name| self.node_target(name).ok())
            .collect()
    }

    /// Checks value ranges
    ///
    /// # Errors
    ///
    /// Returns `Invalid` describing the first offending value.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        let aw = &self.active_window;
        if !(0.0..=1.0).contains(&aw.ratio) {
            return invalid(format!("active_window.ratio must be within [0, 1], got {}", aw.ratio));
        }
        if aw.min_floor_mb.is_nan() || aw.min_floor_mb < 0.0 {
            return invalid(format!(
                "active_window.min_floor_mb must not be negative, got {}",
                aw.min_floor_mb
            ));
        }
        if self.sampler.interval_ms == 0 {
            return invalid("sampler.interval_ms must be positive".to_string());
        }
        if CounterWidth::new(self.sampler.counter_width.bits()).is_none() {
            return invalid(format!(
                "sampler.counter_width must be within 1..=64, got {}",
                self.sampler.counter_width.bits()
            ));
        }
        if self.sampler.bytes_per_event == 0 {
            return invalid("sampler.bytes_per_event must be positive".to_string());
        }
        if self.ssh.port == 0 {
            return invalid("ssh.port must be positive".to_string());
        }

        let t = &self.timing;
        for (name, value) in [
            ("startup_delay_secs", t.startup_delay_secs),
            ("cleanup_delay_secs", t.cleanup_delay_secs),
            ("stop_wait_secs", t.stop_wait_secs),
            ("sampler_start_delay_secs", t.sampler_start_delay_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("timing.{name} must be a non-negative number, got {value}"));
            }
        }
        if t.run_timeout_secs == 0 {
            return invalid("timing.run_timeout_secs must be positive".to_string());
        }

        self.tx_offload.validate()?;
        self.rx_cache.validate()?;
        self.solar.validate()?;
        Ok(())
    }
}
