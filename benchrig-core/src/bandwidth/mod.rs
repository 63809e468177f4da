//! Memory bandwidth summaries from sampler logs

mod estimator;
mod series;

pub use estimator::{
    ActiveSelection, ActiveWindowSettings, BandwidthSummary, estimate, pick_active_indices,
};
pub use series::{BandwidthSample, BandwidthSeries};
