//! Metric extraction
//!
//! Benchmarks report their headline number either on a structured line
//! (`RESULT|total_gbps=12.5|threads=4`) or, in older builds, as free-form
//! per-thread text matched by a [`ThroughputPattern`].

mod extractor;

pub use extractor::{
    Aggregation, MetricSpec, RESULT_SENTINEL, ThroughputPattern, extract_first, extract_metric,
    extract_sum, extract_throughput, parse_result_fields,
};
