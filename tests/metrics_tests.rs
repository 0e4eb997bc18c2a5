//! Integration tests for the metrics aggregators.

use std::time::Duration;

use cachelayer::metrics::{CacheMetrics, RateLimitMetrics, RateScope};

#[test]
fn test_cache_hit_and_miss_rates() {
    let metrics = CacheMetrics::default();
    for key in ["a", "b", "c"] {
        metrics.record_hit(key, Duration::from_millis(1));
    }
    metrics.record_miss("d", Duration::from_millis(1), true);

    let stats = metrics.snapshot();
    assert_eq!(stats.total_requests, 4);
    assert_eq!(stats.hit_rate, 75.0);
    assert_eq!(stats.miss_rate, 25.0);
}

#[test]
fn test_light_throttling_scores_between_90_and_100() {
    let metrics = RateLimitMetrics::default();
    for i in 0..100 {
        metrics.record_check(RateScope::Ip, &format!("10.0.0.{}", i % 20), i >= 5, Duration::ZERO);
    }

    let stats = metrics.snapshot();
    assert!((stats.throttle_rate - 5.0).abs() < 1e-9);
    assert!(stats.effectiveness_score > 90.0);
    assert!(stats.effectiveness_score < 100.0);
}

#[test]
fn test_reset_then_record() {
    let metrics = CacheMetrics::default();
    metrics.record_hit("a", Duration::ZERO);
    metrics.reset();
    metrics.record_miss("a", Duration::ZERO, true);

    let stats = metrics.snapshot();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.miss_rate, 100.0);
}
