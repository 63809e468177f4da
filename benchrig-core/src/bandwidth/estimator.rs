//! Active-window (steady-state) bandwidth estimation
//!
//! A sampler runs longer than the benchmark it observes, so plain averages
//! are diluted by idle samples before start-up and after tear-down. The
//! estimator keeps only samples whose total reaches a fraction of the peak.

use serde::{Deserialize, Serialize};

use super::series::BandwidthSeries;
use crate::error::{TelemetryError, TelemetryResult};

/// Active-window parameters (stored in `config.toml` under `[active_window]`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveWindowSettings {
    /// Fraction of the peak total a sample must reach (default: 0.20)
    #[serde(default = "default_ratio")]
    pub ratio: f64,
    /// Lower bound on the threshold in MB/s (default: 128)
    #[serde(default = "default_min_floor_mb")]
    pub min_floor_mb: f64,
    /// Samples kept even if fewer pass the threshold (default: 2)
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Disable filtering and average every sample
    #[serde(default)]
    pub use_all_samples: bool,
}

const fn default_ratio() -> f64 {
    0.20
}

const fn default_min_floor_mb() -> f64 {
    128.0
}

const fn default_min_samples() -> usize {
    2
}

impl Default for ActiveWindowSettings {
    fn default() -> Self {
        Self {
            ratio: default_ratio(),
            min_floor_mb: default_min_floor_mb(),
            min_samples: default_min_samples(),
            use_all_samples: false,
        }
    }
}

/// Selected sample indices together with the threshold and peak used
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSelection {
    /// Indices of active samples, ascending
    pub indices: Vec<usize>,
    /// Threshold applied (0 when every sample is used)
    pub threshold: f64,
    /// Highest total
    pub peak: f64,
}

/// Picks the active samples of `totals`
///
/// With `use_all_samples` every index is returned with threshold 0.
/// Otherwise `threshold = max(min_floor_mb, peak * ratio)` and every sample at
/// or above it is active. If fewer than `min_samples` qualify, the
/// `min(min_samples, n)` largest totals are used instead (ties keep the
/// earlier sample), still in chronological order.
///
/// # Errors
///
/// Returns `EmptySeries` if `totals` is empty.
pub fn pick_active_indices(
    totals: &[f64],
    settings: &ActiveWindowSettings,
) -> TelemetryResult<ActiveSelection> {
    if totals.is_empty() {
        return Err(TelemetryError::EmptySeries("bandwidth series".to_string()));
    }

    let peak = totals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if settings.use_all_samples {
        return Ok(ActiveSelection {
            indices: (0..totals.len()).collect(),
            threshold: 0.0,
            peak,
        });
    }

    let threshold = settings.min_floor_mb.max(peak * settings.ratio);
    let mut indices: Vec<usize> = totals
        .iter()
        .enumerate()
        .filter(|&(_, &total)| total >= threshold)
        .map(|(i, _)| i)
        .collect();

    if indices.len() < settings.min_samples {
        let keep = settings.min_samples.min(totals.len());
        let mut ranked: Vec<usize> = (0..totals.len()).collect();
        // stable: equal totals keep chronological order
        ranked.sort_by(|&a, &b| totals[b].total_cmp(&totals[a]));
        ranked.truncate(keep);
        ranked.sort_unstable();
        indices = ranked;
    }

    Ok(ActiveSelection {
        indices,
        threshold,
        peak,
    })
}

/// Plain and active-window averages of one sampler log
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandwidthSummary {
    /// Mean read over all samples
    pub avg_read: f64,
    /// Mean write over all samples
    pub avg_write: f64,
    /// `avg_read + avg_write`
    pub avg_total: f64,
    /// Mean read over active samples
    pub active_avg_read: f64,
    /// Mean write over active samples
    pub active_avg_write: f64,
    /// `active_avg_read + active_avg_write`
    pub active_avg_total: f64,
    /// Number of samples
    pub sample_count: usize,
    /// Number of active samples
    pub active_count: usize,
    /// Threshold applied
    pub threshold: f64,
    /// Highest total
    pub peak_total: f64,
}

fn mean(values: impl Iterator<Item = f64>, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        values.sum::<f64>() / count as f64
    }
}

/// Summarizes `series`
///
/// # Errors
///
/// Returns `EmptySeries` if the series has no samples.
pub fn estimate(
    series: &BandwidthSeries,
    settings: &ActiveWindowSettings,
) -> TelemetryResult<BandwidthSummary> {
    let samples = series.samples();
    let selection = pick_active_indices(&series.totals(), settings)?;

    let n = samples.len();
    let avg_read = mean(samples.iter().map(|s| s.read), n);
    let avg_write = mean(samples.iter().map(|s| s.write), n);

    let active = || selection.indices.iter().map(|&i| samples[i]);
    let active_count = selection.indices.len();
    let active_avg_read = mean(active().map(|s| s.read), active_count);
    let active_avg_write = mean(active().map(|s| s.write), active_count);

    Ok(BandwidthSummary {
        avg_read,
        avg_write,
        avg_total: avg_read + avg_write,
        active_avg_read,
        active_avg_write,
        active_avg_total: active_avg_read + active_avg_write,
        sample_count: n,
        active_count,
        threshold: selection.threshold,
        peak_total: selection.peak,
    })
}
