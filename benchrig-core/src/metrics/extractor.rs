//! Throughput extraction from benchmark output

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;

use crate::error::MetricError;

/// Marker that starts a structured result line
pub const RESULT_SENTINEL: &str = "RESULT";

/// Splits `RESULT|k1=v1|k2=v2` into its key/value fields
///
/// The first `|`-separated part (the sentinel) is skipped, parts without `=`
/// are ignored, and only the first `=` of a part separates key from value.
/// Later duplicates of a key overwrite earlier ones.
#[must_use]
pub fn parse_result_fields(line: &str) -> BTreeMap<String, String> {
    line.trim()
        .split('|')
        .skip(1)
        .filter_map(|part| part.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn is_result_line(line: &str) -> bool {
    line.strip_prefix(RESULT_SENTINEL)
        .is_some_and(|rest| rest.starts_with('|'))
}

/// Returns `key` from the first `RESULT|` line that carries it with a numeric
/// value
///
/// Lines whose value for `key` is not a number are skipped.
#[must_use]
pub fn extract_metric(output: &str, key: &str) -> Option<f64> {
    output
        .lines()
        .filter(|line| is_result_line(line))
        .find_map(|line| {
            let fields = parse_result_fields(line);
            let value = fields.get(key)?;
            match value.trim().parse::<f64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::debug!(key, value = %value, "Skipping non-numeric result field");
                    None
                }
            }
        })
}

fn captured_values<'a>(output: &'a str, pattern: &'a Regex) -> impl Iterator<Item = f64> + 'a {
    pattern
        .captures_iter(output)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse::<f64>().ok())
}

/// Sums the capture group of every match of `pattern`
///
/// Returns `None` when nothing matched.
#[must_use]
pub fn extract_sum(output: &str, pattern: &Regex) -> Option<f64> {
    let mut values = captured_values(output, pattern).peekable();
    values.peek()?;
    Some(values.sum())
}

/// Returns the capture group of the first match of `pattern`
#[must_use]
pub fn extract_first(output: &str, pattern: &Regex) -> Option<f64> {
    captured_values(output, pattern).next()
}

/// How fallback matches are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Sum of every match (one line per worker thread)
    Sum,
    /// First match only
    First,
}

/// Free-form fallback pattern with exactly one numeric capture group
#[derive(Debug, Clone)]
pub struct ThroughputPattern {
    regex: Regex,
    aggregation: Aggregation,
}

impl ThroughputPattern {
    /// Compiles `pattern`
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` if the pattern does not compile or does not
    /// have exactly one capture group.
    pub fn new(pattern: &str, aggregation: Aggregation) -> Result<Self, MetricError> {
        let regex = Regex::new(pattern).map_err(|e| MetricError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        // captures_len counts the implicit whole-match group
        let groups = regex.captures_len() - 1;
        if groups != 1 {
            return Err(MetricError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: format!("expected exactly one capture group, found {groups}"),
            });
        }
        Ok(Self { regex, aggregation })
    }

    /// The compiled expression
    #[must_use]
    pub const fn regex(&self) -> &Regex {
        &self.regex
    }

    /// How matches are combined
    #[must_use]
    pub const fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    /// Applies the pattern to `output`
    #[must_use]
    pub fn extract(&self, output: &str) -> Option<f64> {
        match self.aggregation {
            Aggregation::Sum => extract_sum(output, &self.regex),
            Aggregation::First => extract_first(output, &self.regex),
        }
    }
}

/// Where a benchmark reports its headline number
#[derive(Debug, Clone)]
pub struct MetricSpec {
    /// Key looked up on `RESULT|` lines
    pub key: String,
    /// Pattern used when no structured line carries the key
    pub fallback: Option<ThroughputPattern>,
}

impl MetricSpec {
    /// Structured key only
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fallback: None,
        }
    }

    /// Adds a fallback pattern
    #[must_use]
    pub fn with_fallback(mut self, pattern: ThroughputPattern) -> Self {
        self.fallback = Some(pattern);
        self
    }
}

/// Raw value of `key` on the first `RESULT|` line that carries it
fn first_result_field(output: &str, key: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| is_result_line(line))
        .find_map(|line| parse_result_fields(line).remove(key))
}

/// Extracts the metric described by `spec`
///
/// The structured `RESULT|` line wins; the fallback pattern is consulted only
/// when no such line carries the key.
///
/// # Errors
///
/// Returns `InvalidMetric` when structured lines carry the key but none with
/// a numeric value, and `MetricNotFound` naming `log_path` when neither
/// source yields a value. A missing metric is never reported as zero.
pub fn extract_throughput(
    output: &str,
    spec: &MetricSpec,
    log_path: &Path,
) -> Result<f64, MetricError> {
    if let Some(value) = extract_metric(output, &spec.key) {
        return Ok(value);
    }
    if let Some(raw) = first_result_field(output, &spec.key) {
        return Err(MetricError::InvalidMetric {
            key: spec.key.clone(),
            value: raw,
            log_path: log_path.to_path_buf(),
        });
    }
    spec.fallback
        .as_ref()
        .and_then(|p| p.extract(output))
        .ok_or_else(|| MetricError::MetricNotFound {
            key: spec.key.clone(),
            log_path: log_path.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GBPS: &str = r"throughput \[([0-9]+(?:\.[0-9]+)?)\] Gbps";

    #[test]
    fn test_parse_result_fields() {
        let fields = parse_result_fields("RESULT|total_gbps=12.5|threads=4|note=a=b|junk\n");
        assert_eq!(fields.get("total_gbps").map(String::as_str), Some("12.5"));
        assert_eq!(fields.get("threads").map(String::as_str), Some("4"));
        assert_eq!(fields.get("note").map(String::as_str), Some("a=b"));
        assert!(!fields.contains_key("junk"));
        assert!(!fields.contains_key("RESULT"));
    }

    #[test]
    fn test_first_result_line_wins() {
        let output = "RESULT|total_gbps=12.5|threads=4\n\
                      RESULT|total_gbps=12.5|threads=4\n\
                      RESULT|total_gbps=12.5|threads=4\n";
        assert_eq!(extract_metric(output, "total_gbps"), Some(12.5));

        let output = "RESULT|total_gbps=1.0\nRESULT|total_gbps=2.0\n";
        assert_eq!(extract_metric(output, "total_gbps"), Some(1.0));
    }

    #[test]
    fn test_result_line_must_start_with_sentinel() {
        assert_eq!(extract_metric("  RESULT|x=1\nNOTRESULT|x=2\n", "x"), None);
        assert_eq!(extract_metric("RESULTS|x=1\n", "x"), None);
    }

    #[test]
    fn test_non_numeric_value_skipped() {
        let output = "RESULT|total_gbps=nan-ish\nRESULT|total_gbps=7.25\n";
        assert_eq!(extract_metric(output, "total_gbps"), Some(7.25));
    }

    #[test]
    fn test_fallback_sum() {
        let pattern = ThroughputPattern::new(GBPS, Aggregation::Sum).unwrap();
        let output = "thread 0 throughput [3.1] Gbps\nthread 1 throughput [2.9] Gbps\n";
        let value = pattern.extract(output).unwrap();
        assert!((value - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_first() {
        let pattern =
            ThroughputPattern::new(r"Total Speed:\s*([0-9]+(?:\.[0-9]+)?)\s*Mops", Aggregation::First)
                .unwrap();
        let output = "Total Speed: 4.5 Mops\nTotal Speed: 9.0 Mops\n";
        assert_eq!(pattern.extract(output), Some(4.5));
    }

    #[test]
    fn test_pattern_requires_one_group() {
        assert!(matches!(
            ThroughputPattern::new(r"Gbps", Aggregation::Sum),
            Err(MetricError::InvalidPattern { .. })
        ));
        assert!(matches!(
            ThroughputPattern::new(r"(\d+) (\d+)", Aggregation::Sum),
            Err(MetricError::InvalidPattern { .. })
        ));
        assert!(matches!(
            ThroughputPattern::new(r"(unclosed", Aggregation::Sum),
            Err(MetricError::InvalidPattern { .. })
        ));
        assert!(ThroughputPattern::new(r"(?:x)(\d+)", Aggregation::Sum).is_ok());
    }

    #[test]
    fn test_structured_beats_fallback() {
        let spec = MetricSpec::new("total_gbps")
            .with_fallback(ThroughputPattern::new(GBPS, Aggregation::Sum).unwrap());
        let output = "throughput [1.0] Gbps\nRESULT|total_gbps=12.5\n";
        assert_eq!(
            extract_throughput(output, &spec, Path::new("r.log")).unwrap(),
            12.5
        );
    }

    #[test]
    fn test_non_numeric_structured_value_is_error() {
        let spec = MetricSpec::new("total_gbps")
            .with_fallback(ThroughputPattern::new(GBPS, Aggregation::Sum).unwrap());
        let output = "throughput [1.0] Gbps\nRESULT|total_gbps=oops\n";
        let err = extract_throughput(output, &spec, Path::new("logs/relay.log")).unwrap_err();
        match err {
            MetricError::InvalidMetric { key, value, log_path } => {
                assert_eq!(key, "total_gbps");
                assert_eq!(value, "oops");
                assert_eq!(log_path, Path::new("logs/relay.log"));
            }
            other => panic!("expected invalid metric, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_metric_is_error() {
        let spec = MetricSpec::new("total_gbps")
            .with_fallback(ThroughputPattern::new(GBPS, Aggregation::Sum).unwrap());
        let err = extract_throughput("no numbers here\n", &spec, Path::new("logs/r.log"))
            .unwrap_err();
        assert!(err.to_string().contains("logs/r.log"));
    }
}
