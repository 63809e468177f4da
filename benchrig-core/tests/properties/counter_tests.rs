//! Property-based tests for counter wraparound and the sampler state machine

use std::time::{Duration, Instant};

use benchrig_core::sampler::{
    ChannelReading, CounterSnapshot, CounterWidth, GroupReading, RateUnit, SamplerState,
    wrapping_delta,
};
use proptest::prelude::*;

fn snapshot(taken_at: Instant, read: u64, write: u64) -> CounterSnapshot {
    CounterSnapshot {
        groups: vec![GroupReading {
            label: None,
            channels: vec![ChannelReading {
                name: "mss0".to_string(),
                read: vec![read],
                write: vec![write],
            }],
        }],
        taken_at,
        wall_time: chrono::Utc::now(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// An increase of `k` is recovered whether or not the counter wrapped
    #[test]
    fn delta_recovers_increase(bits in 1u32..=64, old_seed in any::<u64>(), k_seed in any::<u64>()) {
        let width = CounterWidth::new(bits).unwrap();
        let modulus = width.modulus();
        let old = (u128::from(old_seed) % modulus) as u64;
        let k = (u128::from(k_seed) % modulus) as u64;
        let new = ((u128::from(old) + u128::from(k)) % modulus) as u64;
        prop_assert_eq!(wrapping_delta(old, new, width), k);
    }

    /// Without wraparound the delta is plain subtraction
    #[test]
    fn delta_without_wrap(old in any::<u32>(), step in any::<u32>()) {
        let new = u64::from(old) + u64::from(step);
        prop_assert_eq!(wrapping_delta(u64::from(old), new, CounterWidth::new(64).unwrap()), u64::from(step));
    }

    /// Readings wider than the counter never overflow and stay below the modulus
    #[test]
    fn delta_of_arbitrary_readings_is_bounded(bits in 1u32..=64, old in any::<u64>(), new in any::<u64>()) {
        let width = CounterWidth::new(bits).unwrap();
        prop_assert!(u128::from(wrapping_delta(old, new, width)) < width.modulus());
    }

    /// Widths outside 1..=64 are rejected
    #[test]
    fn width_bounds(bits in any::<u32>()) {
        prop_assert_eq!(CounterWidth::new(bits).is_some(), (1..=64).contains(&bits));
    }

    /// The first tick is a zero baseline and the second reflects the delta
    #[test]
    fn baseline_then_rate(
        r0 in any::<u32>(),
        w0 in any::<u32>(),
        dr in 0u32..1_000_000,
        dw in 0u32..1_000_000,
    ) {
        let width = CounterWidth::default();
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(1);
        let modulus = width.modulus();
        let r1 = ((u128::from(r0) + u128::from(dr)) % modulus) as u64;
        let w1 = ((u128::from(w0) + u128::from(dw)) % modulus) as u64;

        let (tick, state) = SamplerState::new().advance(
            snapshot(t0, u64::from(r0), u64::from(w0)),
            width,
            64,
            RateUnit::PerSecond,
        );
        prop_assert!(tick.baseline);
        prop_assert_eq!(tick.groups[0].read_mb, 0.0);
        prop_assert_eq!(tick.groups[0].write_mb, 0.0);
        prop_assert!(state.has_baseline());

        let (tick, _) = state.advance(snapshot(t1, r1, w1), width, 64, RateUnit::PerSecond);
        prop_assert!(!tick.baseline);
        let expected_read = f64::from(dr) * 64.0 / 1_048_576.0;
        let expected_write = f64::from(dw) * 64.0 / 1_048_576.0;
        prop_assert!((tick.groups[0].read_mb - expected_read).abs() < 1e-6);
        prop_assert!((tick.groups[0].write_mb - expected_write).abs() < 1e-6);
    }
}
