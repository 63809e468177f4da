//! Counter file layouts of the BlueField-3 performance monitor
//!
//! The `hwmon` device exposes one directory per memory subsystem slice
//! (`mss0`, `mss1`) and per last-level-cache tile (`llt0..7`,
//! `llt_miss0..7`). Each directory has free-running event counters named
//! `counter0..counterN`; one event is one 64-byte cache line.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};

use super::counter::read_hex_counter;
use crate::error::TelemetryResult;

/// Parent of all hwmon devices
pub const DEFAULT_HWMON_ROOT: &str = "/sys/class/hwmon";

/// Device of the BlueField-3 performance monitor
pub const DEFAULT_DEVICE: &str = "hwmon4";

/// Number of LLC tiles
pub const DEFAULT_LLC_CHANNELS: usize = 8;

/// How per-tick deltas are scaled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    /// MB divided by the elapsed seconds since the previous read
    PerSecond,
    /// MB accumulated since the previous read
    PerInterval,
}

impl RateUnit {
    /// Unit suffix used in the sampler log
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::PerSecond => "MB/s",
            Self::PerInterval => "MB",
        }
    }
}

/// Counter files of one channel; sibling files are summed per direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCounters {
    /// Channel name (directory name)
    pub name: String,
    /// Read-direction counters
    pub read: Vec<PathBuf>,
    /// Write-direction counters
    pub write: Vec<PathBuf>,
}

impl ChannelCounters {
    fn new(dir: &Path, name: String, read: &[&str], write: &[&str]) -> Self {
        let channel = dir.join(&name);
        Self {
            read: read.iter().map(|c| channel.join(c)).collect(),
            write: write.iter().map(|c| channel.join(c)).collect(),
            name,
        }
    }
}

/// Channels reported together; the unlabelled group produces the
/// `Read: … Write: …` lines the estimator reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterGroup {
    /// Line prefix (`Cache`, `Miss`), `None` for the memory group
    pub label: Option<String>,
    /// Channels of this group
    pub channels: Vec<ChannelCounters>,
}

/// What to sample and how to scale it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterLayout {
    /// Groups in output order
    pub groups: Vec<CounterGroup>,
    /// Rate unit of the produced ticks
    pub unit: RateUnit,
}

impl CounterLayout {
    /// DRAM bandwidth: `mss0` and `mss1`, `counter0` read, `counter1` write
    #[must_use]
    pub fn memory(device_dir: &Path) -> Self {
        let channels = ["mss0", "mss1"]
            .into_iter()
            .map(|name| {
                ChannelCounters::new(device_dir, name.to_string(), &["counter0"], &["counter1"])
            })
            .collect();
        Self {
            groups: vec![CounterGroup {
                label: None,
                channels,
            }],
            unit: RateUnit::PerSecond,
        }
    }

    /// LLC traffic over `channels` tiles: accesses (`llt{i}`, read
    /// `counter0+1`, write `counter2+3`) and misses (`llt_miss{i}`, read
    /// `counter0`, write `counter1`)
    #[must_use]
    pub fn llc(device_dir: &Path, channels: usize) -> Self {
        let cache = (0..channels)
            .map(|i| {
                ChannelCounters::new(
                    device_dir,
                    format!("llt{i}"),
                    &["counter0", "counter1"],
                    &["counter2", "counter3"],
                )
            })
            .collect();
        let miss = (0..channels)
            .map(|i| {
                ChannelCounters::new(
                    device_dir,
                    format!("llt_miss{i}"),
                    &["counter0"],
                    &["counter1"],
                )
            })
            .collect();
        Self {
            groups: vec![
                CounterGroup {
                    label: Some("Cache".to_string()),
                    channels: cache,
                },
                CounterGroup {
                    label: Some("Miss".to_string()),
                    channels: miss,
                },
            ],
            unit: RateUnit::PerInterval,
        }
    }

    /// Reads every counter file once
    ///
    /// # Errors
    ///
    /// Returns `CounterRead` for the first file that cannot be read.
    pub fn read_snapshot(&self) -> TelemetryResult<CounterSnapshot> {
        let read_all = |paths: &[PathBuf]| -> TelemetryResult<Vec<u64>> {
            paths.iter().map(|p| read_hex_counter(p)).collect()
        };

        let mut groups = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            let mut channels = Vec::with_capacity(group.channels.len());
            for channel in &group.channels {
                channels.push(ChannelReading {
                    name: channel.name.clone(),
                    read: read_all(&channel.read)?,
                    write: read_all(&channel.write)?,
                });
            }
            groups.push(GroupReading {
                label: group.label.clone(),
                channels,
            });
        }

        Ok(CounterSnapshot {
            groups,
            taken_at: Instant::now(),
            wall_time: Utc::now(),
        })
    }
}

/// Raw counter values of one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReading {
    /// Channel name
    pub name: String,
    /// Read-direction counter values, one per file
    pub read: Vec<u64>,
    /// Write-direction counter values, one per file
    pub write: Vec<u64>,
}

/// Raw counter values of one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReading {
    /// Group label
    pub label: Option<String>,
    /// Channel readings
    pub channels: Vec<ChannelReading>,
}

/// One read of every counter in a layout
#[derive(Debug, Clone, PartialEq)]
pub struct CounterSnapshot {
    /// Readings in layout order
    pub groups: Vec<GroupReading>,
    /// Monotonic time of the read
    pub taken_at: Instant,
    /// Wall-clock time of the read
    pub wall_time: DateTime<Utc>,
}
