//! Bandwidth samples parsed back from a sampler log

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{TelemetryError, TelemetryResult};

/// One sampler line: `Read: 12.34 MB/s   Write: 5.67 MB/s`
///
/// Anchored at the start of the line so prefixed group totals
/// (`Cache Read: …`, `Miss Read: …`) are not mistaken for memory samples.
static SAMPLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*Read:\s*([0-9]+(?:\.[0-9]+)?)\s*MB(?:/s)?\s*Write:\s*([0-9]+(?:\.[0-9]+)?)\s*MB(?:/s)?",
    )
    .expect("SAMPLE_REGEX is a valid regex pattern")
});

/// One `(read, write)` sample in MB or MB/s
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandwidthSample {
    /// Read bandwidth
    pub read: f64,
    /// Write bandwidth
    pub write: f64,
}

impl BandwidthSample {
    /// Read plus write
    #[must_use]
    pub fn total(self) -> f64 {
        self.read + self.write
    }
}

/// Ordered samples of one sampler log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandwidthSeries {
    samples: Vec<BandwidthSample>,
}

impl BandwidthSeries {
    /// Builds a series from `(read, write)` pairs
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self {
            samples: pairs
                .into_iter()
                .map(|(read, write)| BandwidthSample { read, write })
                .collect(),
        }
    }

    /// Extracts every sample line from `text`; other lines are ignored
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self::from_pairs(SAMPLE_REGEX.captures_iter(text).filter_map(|caps| {
            let read = caps.get(1)?.as_str().parse().ok()?;
            let write = caps.get(2)?.as_str().parse().ok()?;
            Some((read, write))
        }))
    }

    /// Reads and parses a sampler log
    ///
    /// # Errors
    ///
    /// Returns `LogNotFound` if the file does not exist and `EmptySeries` if
    /// it holds no sample line.
    pub fn from_log(path: &Path) -> TelemetryResult<Self> {
        let text = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TelemetryError::LogNotFound(path.to_path_buf())
            } else {
                TelemetryError::CounterRead {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        })?;
        let series = Self::parse(&String::from_utf8_lossy(&text));
        if series.is_empty() {
            return Err(TelemetryError::EmptySeries(path.display().to_string()));
        }
        Ok(series)
    }

    /// Samples in log order
    #[must_use]
    pub fn samples(&self) -> &[BandwidthSample] {
        &self.samples
    }

    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the series has no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Per-sample read plus write
    #[must_use]
    pub fn totals(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.total()).collect()
    }
}
