//! CSV result files

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use csv::Writer;

use crate::bandwidth::BandwidthSummary;
use crate::error::BenchResult;

/// Writes one experiment's result rows, flushing after each row
///
/// A crash mid-sweep leaves every completed configuration on disk.
pub struct ResultWriter<W: Write> {
    writer: Writer<W>,
    columns: usize,
    rows: usize,
}

impl ResultWriter<File> {
    /// Creates (or truncates) `path`, creating parent directories, and writes
    /// the header
    ///
    /// # Errors
    ///
    /// Returns an I/O or CSV error if the file cannot be created.
    pub fn create(path: &Path, header: &[&str]) -> BenchResult<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        Self::from_writer(File::create(path)?, header)
    }
}

impl<W: Write> ResultWriter<W> {
    /// Wraps any writer and writes the header
    ///
    /// # Errors
    ///
    /// Returns a CSV error if the header cannot be written.
    pub fn from_writer(inner: W, header: &[&str]) -> BenchResult<Self> {
        let mut writer = Writer::from_writer(inner);
        writer.write_record(header)?;
        writer.flush()?;
        Ok(Self {
            writer,
            columns: header.len(),
            rows: 0,
        })
    }

    /// Appends one row and flushes it
    ///
    /// # Errors
    ///
    /// Returns a CSV error on write failure or if the row width differs from
    /// the header.
    pub fn write_row(&mut self, row: &[String]) -> BenchResult<()> {
        debug_assert_eq!(row.len(), self.columns, "row width must match header");
        self.writer.write_record(row)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far (header excluded)
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Flushes and returns the inner writer
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the final flush fails.
    pub fn into_inner(self) -> BenchResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()).into())
    }
}

/// Current UTC time as written to `timestamp_utc`
#[must_use]
pub fn timestamp_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Fixed six-decimal rendering used for every measured value
#[must_use]
pub fn fixed6(value: f64) -> String {
    format!("{value:.6}")
}

/// Column names of the memory summary block
pub const MEMORY_COLUMNS: [&str; 10] = [
    "memory_avg_read_mb",
    "memory_avg_write_mb",
    "memory_avg_total_mb",
    "memory_active_avg_read_mb",
    "memory_active_avg_write_mb",
    "memory_active_avg_total_mb",
    "memory_samples",
    "memory_active_samples",
    "memory_active_threshold_mb",
    "memory_peak_total_mb",
];

/// Renders the memory summary block; all fields empty without a summary
#[must_use]
pub fn memory_cells(summary: Option<&BandwidthSummary>) -> Vec<String> {
    match summary {
        Some(s) => vec![
            fixed6(s.avg_read),
            fixed6(s.avg_write),
            fixed6(s.avg_total),
            fixed6(s.active_avg_read),
            fixed6(s.active_avg_write),
            fixed6(s.active_avg_total),
            s.sample_count.to_string(),
            s.active_count.to_string(),
            fixed6(s.threshold),
            fixed6(s.peak_total),
        ],
        None => vec![String::new(); MEMORY_COLUMNS.len()],
    }
}
