//! Property-Based Tests for the Metrics Module

use proptest::prelude::*;
use std::time::Duration;

use super::aggregator::tests::TestOp;
use super::{effectiveness_score, Aggregator, AggregatorConfig, CacheMetrics};

#[derive(Debug, Clone)]
enum Lookup {
    Hit,
    Miss { failed: bool },
}

fn lookup_strategy() -> impl Strategy<Value = Lookup> {
    prop_oneof![
        Just(Lookup::Hit),
        any::<bool>().prop_map(|failed| Lookup::Miss { failed }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Hits and misses always partition the lookups, and the two rates sum to
    // 100 once any lookup has been made.
    #[test]
    fn prop_hit_miss_accounting(lookups in prop::collection::vec(lookup_strategy(), 0..200)) {
        let metrics = CacheMetrics::default();
        for lookup in &lookups {
            match lookup {
                Lookup::Hit => metrics.record_hit("k", Duration::ZERO),
                Lookup::Miss { failed } => metrics.record_miss("k", Duration::ZERO, !failed),
            }
        }

        let stats = metrics.snapshot();
        prop_assert_eq!(stats.hits + stats.misses, stats.total_requests);
        prop_assert_eq!(stats.total_requests, lookups.len() as u64);
        if stats.total_requests > 0 {
            prop_assert!((stats.hit_rate + stats.miss_rate - 100.0).abs() < 1e-9);
        } else {
            prop_assert_eq!(stats.hit_rate, 0.0);
            prop_assert_eq!(stats.miss_rate, 0.0);
        }
    }

    // History and event rings never exceed their bounds.
    #[test]
    fn prop_history_bounded(
        max_history in 2usize..64,
        max_events in 2usize..16,
        durations in prop::collection::vec(0u64..40, 0..500),
    ) {
        let agg: Aggregator<TestOp> = Aggregator::new(AggregatorConfig {
            max_history,
            max_events,
            slow_threshold: Duration::from_millis(20),
        });
        for (i, ms) in durations.iter().enumerate() {
            agg.record(TestOp::Read, "op", Duration::from_millis(*ms), i % 7 != 0);
            prop_assert!(agg.history_len() <= max_history);
        }

        let stats = agg.snapshot();
        prop_assert!(stats.recent_operations.len() <= max_history);
        prop_assert!(stats.notable_events.len() <= max_events);
        prop_assert_eq!(stats.total, durations.len() as u64);
    }

    // Higher throttle rates never score better.
    #[test]
    fn prop_effectiveness_monotonic(a in 0.0f64..100.0, b in 0.0f64..100.0) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(effectiveness_score(low) >= effectiveness_score(high));
    }

    #[test]
    fn prop_effectiveness_in_range(r in 0.0f64..100.0) {
        let score = effectiveness_score(r);
        prop_assert!((0.0..=100.0).contains(&score));
    }
}
