//! Summaries of result CSVs.

use std::fmt::Write as _;
use std::path::Path;

use benchrig_core::results::Series;
use benchrig_core::{BenchError, ResultKind, ResultSummary, summarize};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Summarize command handler
pub fn cmd_summarize(csv: &Path, kind: ResultKind, format: OutputFormat) -> Result<(), CliError> {
    let summary = summarize(csv, kind).map_err(BenchError::from)?;
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

fn write_series(out: &mut String, title: &str, x_label: &str, series: &[Series]) {
    let _ = writeln!(out, "{title}");
    for s in series {
        let _ = writeln!(out, "  {}", s.label);
        let _ = writeln!(out, "    {x_label:<24} {:>12} {:>5}", "mean", "runs");
        for point in &s.points {
            let _ = writeln!(out, "    {:<24} {:>12.3} {:>5}", point.x, point.mean, point.runs);
        }
    }
}

/// Renders every series, throughput first
pub fn format_table(summary: &ResultSummary) -> String {
    let kind = summary.kind;
    let mut out = String::new();
    write_series(&mut out, kind.y_label(), kind.x_label(), &summary.throughput);
    if !summary.memory.is_empty() {
        out.push('\n');
        write_series(
            &mut out,
            "Memory Bandwidth (MB/s)",
            kind.x_label(),
            &summary.memory,
        );
    }
    out
}
