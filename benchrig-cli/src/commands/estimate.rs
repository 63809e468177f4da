//! Active-window estimate of a sampler log.

use std::fmt::Write as _;
use std::path::Path;

use benchrig_core::{ActiveWindowSettings, BandwidthSeries, BandwidthSummary, BenchError, estimate};

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::util::load_config;

/// Estimator flags overriding `[active_window]`
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowOverrides {
    /// `--ratio`
    pub ratio: Option<f64>,
    /// `--floor`
    pub floor: Option<f64>,
    /// `--min-samples`
    pub min_samples: Option<usize>,
    /// `--all-samples`
    pub all_samples: bool,
}

impl WindowOverrides {
    fn apply(self, mut settings: ActiveWindowSettings) -> Result<ActiveWindowSettings, CliError> {
        if let Some(ratio) = self.ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(CliError::Config(format!(
                    "--ratio must be within [0, 1], got {ratio}"
                )));
            }
            settings.ratio = ratio;
        }
        if let Some(floor) = self.floor {
            if !floor.is_finite() || floor < 0.0 {
                return Err(CliError::Config(format!(
                    "--floor must be a non-negative number, got {floor}"
                )));
            }
            settings.min_floor_mb = floor;
        }
        if let Some(min_samples) = self.min_samples {
            settings.min_samples = min_samples;
        }
        if self.all_samples {
            settings.use_all_samples = true;
        }
        Ok(settings)
    }
}

/// Estimate command handler
pub fn cmd_estimate(
    config_path: Option<&Path>,
    log: &Path,
    overrides: WindowOverrides,
    format: OutputFormat,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let settings = overrides.apply(config.active_window)?;

    let series = BandwidthSeries::from_log(log).map_err(BenchError::from)?;
    let summary = estimate(&series, &settings).map_err(BenchError::from)?;

    match format {
        OutputFormat::Table => print!("{}", format_table(&summary)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&summary)
                .map_err(|e| CliError::Output(format!("Failed to serialize: {e}")))?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Renders a summary as aligned `name: value` lines
pub fn format_table(summary: &BandwidthSummary) -> String {
    let mut out = String::new();
    let rows = [
        ("Samples", format!("{}", summary.sample_count)),
        ("Active samples", format!("{}", summary.active_count)),
        ("Peak total", format!("{:.2} MB/s", summary.peak_total)),
        ("Threshold", format!("{:.2} MB/s", summary.threshold)),
        ("Avg read", format!("{:.2} MB/s", summary.avg_read)),
        ("Avg write", format!("{:.2} MB/s", summary.avg_write)),
        ("Avg total", format!("{:.2} MB/s", summary.avg_total)),
        ("Active avg read", format!("{:.2} MB/s", summary.active_avg_read)),
        ("Active avg write", format!("{:.2} MB/s", summary.active_avg_write)),
        ("Active avg total", format!("{:.2} MB/s", summary.active_avg_total)),
    ];
    for (name, value) in rows {
        let _ = writeln!(out, "{:<18}{value}", format!("{name}:"));
    }
    out
}
