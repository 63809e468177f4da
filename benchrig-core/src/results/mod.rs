//! Result summaries
//!
//! Reads an experiment CSV back and averages repeated runs per label and
//! x-value: payload size for TX offload, working set for RX cache, threads
//! for Solar. RX cache files additionally yield a memory bandwidth series.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use csv::StringRecord;
use serde::Serialize;

use crate::error::{TelemetryError, TelemetryResult};
use crate::experiment::{RX_METHODS, SOLAR_TYPES, TX_METHODS};

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Memory columns in order of preference
const MEMORY_FIELDS: [&str; 2] = ["memory_active_avg_total_mb", "memory_avg_total_mb"];

/// Which experiment produced a result file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultKind {
    /// `tx-offload`
    TxOffload,
    /// `rx-cache`
    RxCache,
    /// `solar`
    Solar,
}

impl ResultKind {
    /// Column holding the series label
    #[must_use]
    pub const fn label_field(self) -> &'static str {
        match self {
            Self::TxOffload | Self::RxCache => "method_label",
            Self::Solar => "type_label",
        }
    }

    /// Column holding the measured value
    #[must_use]
    pub const fn value_field(self) -> &'static str {
        match self {
            Self::TxOffload | Self::RxCache => "total_gbps",
            Self::Solar => "total_mops",
        }
    }

    /// Axis description of x
    #[must_use]
    pub const fn x_label(self) -> &'static str {
        match self {
            Self::TxOffload => "Payload Size (Bytes)",
            Self::RxCache => "Working Set Size (MiB)",
            Self::Solar => "Threads",
        }
    }

    /// Axis description of the measured value
    #[must_use]
    pub const fn y_label(self) -> &'static str {
        match self {
            Self::TxOffload | Self::RxCache => "Throughput (Gbps)",
            Self::Solar => "Throughput (Mops)",
        }
    }

    fn label_order(self) -> Vec<&'static str> {
        match self {
            Self::TxOffload => TX_METHODS.iter().map(|(_, l)| *l).collect(),
            Self::RxCache => RX_METHODS.iter().map(|(_, l)| *l).collect(),
            Self::Solar => SOLAR_TYPES.iter().map(|(_, l)| *l).collect(),
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TxOffload => "tx-offload",
            Self::RxCache => "rx-cache",
            Self::Solar => "solar",
        })
    }
}

impl FromStr for ResultKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tx-offload" | "tx" | "exp1" => Ok(Self::TxOffload),
            "rx-cache" | "rx" | "exp2" => Ok(Self::RxCache),
            "solar" | "exp4" => Ok(Self::Solar),
            _ => Err(format!("unknown experiment: {s}")),
        }
    }
}

/// Mean of the runs sharing one x-value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// x in axis units
    pub x: f64,
    /// Mean value
    pub mean: f64,
    /// Number of runs averaged
    pub runs: usize,
}

/// Points of one label, sorted by x
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    /// Method or type label
    pub label: String,
    /// Points, ascending x
    pub points: Vec<SeriesPoint>,
}

/// Everything summarized from one result file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSummary {
    /// Producing experiment
    pub kind: ResultKind,
    /// Measured value per label
    pub throughput: Vec<Series>,
    /// Memory bandwidth per label (RX cache only, may be empty)
    pub memory: Vec<Series>,
}

impl ResultSummary {
    /// Every x-value that appears in the throughput series, ascending
    #[must_use]
    pub fn x_values(&self) -> Vec<f64> {
        let mut xs: Vec<f64> = self
            .throughput
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.x))
            .collect();
        xs.sort_by(f64::total_cmp);
        xs.dedup();
        xs
    }
}

/// label -> x key -> values
type Buckets = BTreeMap<String, BTreeMap<u64, Vec<f64>>>;

struct Columns<'a> {
    headers: &'a StringRecord,
    source: &'a str,
}

impl Columns<'_> {
    fn index(&self, field: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == field)
    }

    fn require(&self, field: &str) -> TelemetryResult<usize> {
        self.index(field)
            .ok_or_else(|| TelemetryError::MissingTelemetryField {
                field: field.to_string(),
                source_name: self.source.to_string(),
            })
    }

    fn cell<'r>(&self, record: &'r StringRecord, field: &str) -> Option<&'r str> {
        self.index(field)
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, field: &str, raw: &str) -> TelemetryResult<T> {
        raw.parse().map_err(|_| TelemetryError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
            source_name: self.source.to_string(),
        })
    }

    fn required_value<T: FromStr>(&self, record: &StringRecord, field: &str) -> TelemetryResult<T> {
        let raw = self
            .cell(record, field)
            .ok_or_else(|| TelemetryError::MissingTelemetryField {
                field: field.to_string(),
                source_name: self.source.to_string(),
            })?;
        self.parse(field, raw)
    }

    /// `working_set_size`, else `nb_rxd * payload_size * threads`, in bytes
    fn working_set(&self, record: &StringRecord) -> TelemetryResult<u64> {
        if let Some(raw) = self.cell(record, "working_set_size") {
            let bytes: f64 = self.parse("working_set_size", raw)?;
            return Ok(bytes as u64);
        }
        let parts = (
            self.cell(record, "nb_rxd"),
            self.cell(record, "payload_size"),
            self.cell(record, "threads"),
        );
        match parts {
            (Some(nb_rxd), Some(payload), Some(threads)) => {
                let nb_rxd: u64 = self.parse("nb_rxd", nb_rxd)?;
                let payload: u64 = self.parse("payload_size", payload)?;
                let threads: u64 = self.parse("threads", threads)?;
                nb_rxd
                    .checked_mul(payload)
                    .and_then(|v| v.checked_mul(threads))
                    .ok_or_else(|| TelemetryError::InvalidValue {
                        field: "working_set_size".to_string(),
                        value: format!("{nb_rxd} * {payload} * {threads}"),
                        source_name: self.source.to_string(),
                    })
            }
            _ => Err(TelemetryError::MissingTelemetryField {
                field: "working_set_size".to_string(),
                source_name: self.source.to_string(),
            }),
        }
    }

    fn memory(&self, record: &StringRecord) -> TelemetryResult<Option<f64>> {
        MEMORY_FIELDS
            .iter()
            .find_map(|field| self.cell(record, field).map(|raw| (*field, raw)))
            .map(|(field, raw)| self.parse(field, raw))
            .transpose()
    }
}

fn x_key(kind: ResultKind, columns: &Columns<'_>, record: &StringRecord) -> TelemetryResult<u64> {
    match kind {
        ResultKind::TxOffload => columns.required_value(record, "payload_size"),
        ResultKind::Solar => columns.required_value(record, "threads"),
        ResultKind::RxCache => columns.working_set(record),
    }
}

fn x_value(kind: ResultKind, key: u64) -> f64 {
    match kind {
        ResultKind::RxCache => key as f64 / BYTES_PER_MIB,
        ResultKind::TxOffload | ResultKind::Solar => key as f64,
    }
}

fn into_series(kind: ResultKind, buckets: Buckets) -> Vec<Series> {
    let order = kind.label_order();
    let rank = |label: &str| order.iter().position(|l| *l == label).unwrap_or(order.len());

    let mut series: Vec<Series> = buckets
        .into_iter()
        .map(|(label, points)| Series {
            label,
            points: points
                .into_iter()
                .map(|(key, values)| SeriesPoint {
                    x: x_value(kind, key),
                    mean: values.iter().sum::<f64>() / values.len() as f64,
                    runs: values.len(),
                })
                .collect(),
        })
        .collect();
    // known labels in sweep order, others after them alphabetically
    series.sort_by_key(|s| rank(&s.label));
    series
}

/// Summarizes CSV data read from `reader`
///
/// `source` names the data in error messages.
///
/// # Errors
///
/// Returns `MissingTelemetryField` for absent columns or x fields,
/// `InvalidValue` for unparsable numbers, `EmptySeries` when there are no rows
/// and `Csv` on malformed input.
pub fn summarize_reader<R: Read>(
    reader: R,
    kind: ResultKind,
    source: &str,
) -> TelemetryResult<ResultSummary> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();
    let columns = Columns {
        headers: &headers,
        source,
    };
    let label_idx = columns.require(kind.label_field())?;
    columns.require(kind.value_field())?;

    let mut throughput = Buckets::new();
    let mut memory = Buckets::new();
    for record in reader.records() {
        let record = record?;
        let label = record.get(label_idx).unwrap_or_default().trim().to_string();
        let key = x_key(kind, &columns, &record)?;
        let value: f64 = columns.required_value(&record, kind.value_field())?;

        throughput
            .entry(label.clone())
            .or_default()
            .entry(key)
            .or_default()
            .push(value);

        if kind == ResultKind::RxCache {
            if let Some(mb) = columns.memory(&record)? {
                memory.entry(label).or_default().entry(key).or_default().push(mb);
            }
        }
    }

    if throughput.is_empty() {
        return Err(TelemetryError::EmptySeries(source.to_string()));
    }

    Ok(ResultSummary {
        kind,
        throughput: into_series(kind, throughput),
        memory: into_series(kind, memory),
    })
}

/// Summarizes the CSV file at `path`
///
/// # Errors
///
/// Returns `LogNotFound` if the file does not exist, otherwise see
/// [`summarize_reader`].
pub fn summarize(path: &Path, kind: ResultKind) -> TelemetryResult<ResultSummary> {
    let file = std::fs::File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            TelemetryError::LogNotFound(path.to_path_buf())
        } else {
            TelemetryError::Csv(e.into())
        }
    })?;
    summarize_reader(file, kind, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TX_CSV: &str = "\
timestamp_utc,method,method_label,payload_size,threads,total_gbps,relay_log,server_log,client_log
t,arm_relay_1_3,Header-only Offloading TX,256,2,30.0,r,s,c
t,arm_relay_1_1,RDMA-assisted TX,256,2,10.0,r,s,c
t,arm_relay_1_1,RDMA-assisted TX,128,2,4.0,r,s,c
t,arm_relay_1_1,RDMA-assisted TX,128,2,6.0,r,s,c
";

    #[test]
    fn test_tx_groups_and_orders() {
        let summary = summarize_reader(TX_CSV.as_bytes(), ResultKind::TxOffload, "tx.csv").unwrap();
        assert_eq!(summary.throughput.len(), 2);
        let rdma = &summary.throughput[0];
        assert_eq!(rdma.label, "RDMA-assisted TX");
        assert_eq!(rdma.points.len(), 2);
        assert!((rdma.points[0].x - 128.0).abs() < f64::EPSILON);
        assert!((rdma.points[0].mean - 5.0).abs() < 1e-9);
        assert_eq!(rdma.points[0].runs, 2);
        assert_eq!(summary.throughput[1].label, "Header-only Offloading TX");
        assert!(summary.memory.is_empty());
        assert_eq!(summary.x_values(), vec![128.0, 256.0]);
    }

    #[test]
    fn test_rx_working_set_and_memory() {
        let csv = "\
method_label,payload_size,threads,total_gbps,memory_avg_total_mb,memory_active_avg_total_mb,nb_rxd,working_set_size
RDMA-assisted RX,1024,8,5.0,100.0,400.0,128,
RDMA-assisted RX,1024,8,7.0,50.0,,128,
DMA-assisted RX,2048,8,9.0,,,,2097152
";
        let summary = summarize_reader(csv.as_bytes(), ResultKind::RxCache, "rx.csv").unwrap();
        let rdma = &summary.throughput[0];
        assert_eq!(rdma.label, "RDMA-assisted RX");
        // 128 * 1024 * 8 bytes = 1 MiB
        assert!((rdma.points[0].x - 1.0).abs() < 1e-9);
        assert!((rdma.points[0].mean - 6.0).abs() < 1e-9);

        let dma = &summary.throughput[1];
        assert!((dma.points[0].x - 2.0).abs() < 1e-9);

        // active column preferred, plain average as fallback
        assert_eq!(summary.memory.len(), 1);
        assert!((summary.memory[0].points[0].mean - 225.0).abs() < 1e-9);
    }

    #[test]
    fn test_rx_missing_working_set() {
        let csv = "method_label,payload_size,threads,total_gbps\nRDMA-assisted RX,1024,8,5.0\n";
        let err = summarize_reader(csv.as_bytes(), ResultKind::RxCache, "rx.csv").unwrap_err();
        assert!(matches!(
            err,
            TelemetryError::MissingTelemetryField { ref field, .. } if field == "working_set_size"
        ));
    }

    #[test]
    fn test_rx_working_set_overflow() {
        let csv = "method_label,payload_size,threads,total_gbps,nb_rxd\n\
                   RDMA-assisted RX,18446744073709551615,8,5.0,4096\n";
        let err = summarize_reader(csv.as_bytes(), ResultKind::RxCache, "rx.csv").unwrap_err();
        assert!(matches!(
            err,
            TelemetryError::InvalidValue { ref field, .. } if field == "working_set_size"
        ));
    }

    #[test]
    fn test_solar_by_threads() {
        let csv = "\
timestamp_utc,type,type_label,threads,payload_size,total_mops,client_log,server_log
t,2,CPU+CRC offload+DSA,4,4096,9.0,c,s
t,0,CPU-only,4,4096,3.0,c,s
t,0,CPU-only,1,4096,1.0,c,s
";
        let summary = summarize_reader(csv.as_bytes(), ResultKind::Solar, "solar.csv").unwrap();
        assert_eq!(summary.throughput[0].label, "CPU-only");
        assert_eq!(summary.throughput[0].points.len(), 2);
        assert_eq!(summary.throughput[1].label, "CPU+CRC offload+DSA");
        assert_eq!(summary.x_values(), vec![1.0, 4.0]);
    }

    #[test]
    fn test_missing_value_column() {
        let csv = "method_label,payload_size\nRDMA-assisted TX,128\n";
        let err = summarize_reader(csv.as_bytes(), ResultKind::TxOffload, "tx.csv").unwrap_err();
        assert!(err.to_string().contains("total_gbps"));
    }

    #[test]
    fn test_invalid_value() {
        let csv = "method_label,payload_size,total_gbps\nRDMA-assisted TX,128,fast\n";
        let err = summarize_reader(csv.as_bytes(), ResultKind::TxOffload, "tx.csv").unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidValue { .. }));
    }

    #[test]
    fn test_no_rows() {
        let csv = "method_label,payload_size,total_gbps\n";
        let err = summarize_reader(csv.as_bytes(), ResultKind::TxOffload, "tx.csv").unwrap_err();
        assert!(matches!(err, TelemetryError::EmptySeries(_)));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = summarize(&dir.path().join("none.csv"), ResultKind::Solar).unwrap_err();
        assert!(matches!(err, TelemetryError::LogNotFound(_)));
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("tx-offload".parse::<ResultKind>().unwrap(), ResultKind::TxOffload);
        assert_eq!("EXP2".parse::<ResultKind>().unwrap(), ResultKind::RxCache);
        assert!("exp3".parse::<ResultKind>().is_err());
        assert_eq!(ResultKind::Solar.to_string(), "solar");
    }
}
