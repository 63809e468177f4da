//! Property-based tests for metric extraction

use std::path::Path;

use benchrig_core::metrics::{Aggregation, MetricSpec, ThroughputPattern, extract_throughput};
use benchrig_core::{MetricError, extract_metric};
use proptest::prelude::*;

const GBPS: &str = r"throughput \[([0-9]+(?:\.[0-9]+)?)\] Gbps";

/// Values as a benchmark prints them, with three decimals
fn arb_value() -> impl Strategy<Value = f64> {
    (0u32..1_000_000).prop_map(|milli| f64::from(milli) / 1000.0)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A structured line yields its value regardless of surrounding noise
    #[test]
    fn structured_value_extracted(value in arb_value(), noise in "[a-z ]{0,40}", threads in 1u32..64) {
        let output = format!("{noise}\nRESULT|threads={threads}|total_gbps={value:.3}\n{noise}\n");
        let got = extract_metric(&output, "total_gbps").unwrap();
        prop_assert!((got - value).abs() < 1e-9);
    }

    /// The structured line wins over any fallback matches
    #[test]
    fn structured_line_preferred(value in arb_value(), other in arb_value()) {
        let output = format!("throughput [{other:.3}] Gbps\nRESULT|total_gbps={value:.3}\n");
        let spec = MetricSpec::new("total_gbps")
            .with_fallback(ThroughputPattern::new(GBPS, Aggregation::Sum).unwrap());
        let got = extract_throughput(&output, &spec, Path::new("relay.log")).unwrap();
        prop_assert!((got - value).abs() < 1e-9);
    }

    /// Fallback sum equals the sum of every per-thread value
    #[test]
    fn fallback_sums_all_threads(values in prop::collection::vec(arb_value(), 1..16)) {
        let output: String = values
            .iter()
            .enumerate()
            .map(|(i, v)| format!("thread {i} throughput [{v:.3}] Gbps\n"))
            .collect();
        let spec = MetricSpec::new("total_gbps")
            .with_fallback(ThroughputPattern::new(GBPS, Aggregation::Sum).unwrap());
        let got = extract_throughput(&output, &spec, Path::new("relay.log")).unwrap();
        let expected: f64 = values.iter().sum();
        prop_assert!((got - expected).abs() < 1e-6);
    }

    /// Output without any metric is an error, never zero
    #[test]
    fn missing_metric_is_error(noise in "[a-z ]{0,80}") {
        let spec = MetricSpec::new("total_mops");
        let err = extract_throughput(&noise, &spec, Path::new("client.log")).unwrap_err();
        let is_not_found = matches!(err, MetricError::MetricNotFound { .. });
        prop_assert!(is_not_found);
    }
}
