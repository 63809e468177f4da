//! Property-based tests for active-window bandwidth estimation

use benchrig_core::{ActiveWindowSettings, BandwidthSeries, estimate, pick_active_indices};
use proptest::prelude::*;

// ========== Strategies ==========

fn arb_pairs() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((0.0f64..20_000.0, 0.0f64..20_000.0), 1..64)
}

fn arb_settings() -> impl Strategy<Value = ActiveWindowSettings> {
    (0.0f64..=1.0, 0.0f64..1_000.0, 0usize..8, any::<bool>()).prop_map(
        |(ratio, min_floor_mb, min_samples, use_all_samples)| ActiveWindowSettings {
            ratio,
            min_floor_mb,
            min_samples,
            use_all_samples,
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Indices are strictly ascending and in range
    #[test]
    fn indices_sorted_and_in_range(pairs in arb_pairs(), settings in arb_settings()) {
        let series = BandwidthSeries::from_pairs(pairs);
        let selection = pick_active_indices(&series.totals(), &settings).unwrap();
        prop_assert!(selection.indices.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(selection.indices.iter().all(|&i| i < series.len()));
    }

    /// At least `min(min_samples, n)` samples are always active
    #[test]
    fn active_count_lower_bound(pairs in arb_pairs(), settings in arb_settings()) {
        let n = pairs.len();
        let summary = estimate(&BandwidthSeries::from_pairs(pairs), &settings).unwrap();
        prop_assert!(summary.active_count >= settings.min_samples.min(n));
        prop_assert!(summary.active_count <= n);
        prop_assert_eq!(summary.sample_count, n);
    }

    /// Averages never exceed the peak total
    #[test]
    fn averages_bounded_by_peak(pairs in arb_pairs(), settings in arb_settings()) {
        let summary = estimate(&BandwidthSeries::from_pairs(pairs), &settings).unwrap();
        prop_assert!(summary.active_avg_total <= summary.peak_total + 1e-6);
        prop_assert!(summary.avg_total <= summary.peak_total + 1e-6);
        prop_assert!((summary.avg_total - (summary.avg_read + summary.avg_write)).abs() < 1e-6);
    }

    /// Every sample at or above the threshold is active when filtering applies
    #[test]
    fn threshold_members_selected(pairs in arb_pairs(), settings in arb_settings()) {
        prop_assume!(!settings.use_all_samples);
        let series = BandwidthSeries::from_pairs(pairs);
        let totals = series.totals();
        let selection = pick_active_indices(&totals, &settings).unwrap();
        let above = totals.iter().filter(|&&t| t >= selection.threshold).count();
        if above >= settings.min_samples {
            prop_assert_eq!(selection.indices.len(), above);
        }
        prop_assert!(selection.threshold >= settings.min_floor_mb);
    }

    /// Disabling the filter selects every sample with threshold zero
    #[test]
    fn use_all_selects_everything(pairs in arb_pairs()) {
        let settings = ActiveWindowSettings { use_all_samples: true, ..Default::default() };
        let n = pairs.len();
        let summary = estimate(&BandwidthSeries::from_pairs(pairs), &settings).unwrap();
        prop_assert_eq!(summary.active_count, n);
        prop_assert_eq!(summary.threshold, 0.0);
        prop_assert!((summary.active_avg_total - summary.avg_total).abs() < 1e-6);
    }
}
