//! Sampler settings (stored in `config.toml` under `[sampler]`)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::counter::CounterWidth;
use super::layout::{DEFAULT_DEVICE, DEFAULT_HWMON_ROOT, DEFAULT_LLC_CHANNELS};

/// Shortest accepted sampling interval
pub const MIN_INTERVAL_MS: u64 = 50;

/// Longest accepted sampling interval
pub const MAX_INTERVAL_MS: u64 = 60_000;

/// Counter sampling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerSettings {
    /// Sampler binary as invoked on the node
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Parent directory of the hwmon devices
    #[serde(default = "default_hwmon_root")]
    pub hwmon_root: PathBuf,
    /// hwmon device name
    #[serde(default = "default_device")]
    pub device: String,
    /// Sampling interval in milliseconds (50–60000, default: 500)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Counter width in bits (default: 32)
    #[serde(default)]
    pub counter_width: CounterWidth,
    /// Bytes represented by one counter event (default: 64)
    #[serde(default = "default_bytes_per_event")]
    pub bytes_per_event: u64,
    /// LLC tiles to sample (default: 8)
    #[serde(default = "default_llc_channels")]
    pub llc_channels: usize,
}

fn default_binary() -> String {
    "bwmon".to_string()
}

fn default_hwmon_root() -> PathBuf {
    PathBuf::from(DEFAULT_HWMON_ROOT)
}

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

const fn default_interval_ms() -> u64 {
    500
}

const fn default_bytes_per_event() -> u64 {
    64
}

const fn default_llc_channels() -> usize {
    DEFAULT_LLC_CHANNELS
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            hwmon_root: default_hwmon_root(),
            device: default_device(),
            interval_ms: default_interval_ms(),
            counter_width: CounterWidth::default(),
            bytes_per_event: default_bytes_per_event(),
            llc_channels: default_llc_channels(),
        }
    }
}

impl SamplerSettings {
    /// Returns the interval clamped to the valid range
    #[must_use]
    pub const fn effective_interval(&self) -> Duration {
        let ms = if self.interval_ms < MIN_INTERVAL_MS {
            MIN_INTERVAL_MS
        } else if self.interval_ms > MAX_INTERVAL_MS {
            MAX_INTERVAL_MS
        } else {
            self.interval_ms
        };
        Duration::from_millis(ms)
    }

    /// Directory holding the device's counter directories
    #[must_use]
    pub fn device_dir(&self) -> PathBuf {
        self.hwmon_root.join(&self.device)
    }
}
