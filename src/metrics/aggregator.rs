//! Generic concurrent metrics aggregator.
//!
//! Counters and duration totals are lock-free atomics so the recording hot
//! path never contends. The two bounded rings (operation history and notable
//! events) sit behind short-held RwLocks touched only for append, compaction
//! and snapshot copies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;

use super::record::{
    percentage, percentile, AggregateStats, KindCount, OperationKind, OperationRecord, WindowStats,
};

/// Default bound of the operation history ring.
pub const DEFAULT_HISTORY_SIZE: usize = 1000;

/// Default bound of the notable-events ring.
pub const DEFAULT_EVENT_SIZE: usize = 100;

/// Sizing and classification settings for an [`Aggregator`].
#[derive(Debug, Clone, Copy)]
pub struct AggregatorConfig {
    pub max_history: usize,
    pub max_events: usize,
    /// Operations slower than this are classified notable
    pub slow_threshold: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_HISTORY_SIZE,
            max_events: DEFAULT_EVENT_SIZE,
            slow_threshold: Duration::from_millis(100),
        }
    }
}

// == Aggregator ==
#[derive(Debug)]
pub struct Aggregator<K: OperationKind> {
    config: AggregatorConfig,
    total: AtomicU64,
    per_kind: Box<[AtomicU64]>,
    errors: AtomicU64,
    notable: AtomicU64,
    duration_sum_us: AtomicU64,
    duration_min_us: AtomicU64,
    duration_max_us: AtomicU64,
    history: RwLock<Vec<OperationRecord<K>>>,
    events: RwLock<Vec<OperationRecord<K>>>,
}

impl<K: OperationKind> Aggregator<K> {
    pub fn new(config: AggregatorConfig) -> Self {
        let config = AggregatorConfig {
            max_history: config.max_history.max(2),
            max_events: config.max_events.max(2),
            ..config
        };
        Self {
            config,
            total: AtomicU64::new(0),
            per_kind: K::ALL.iter().map(|_| AtomicU64::new(0)).collect(),
            errors: AtomicU64::new(0),
            notable: AtomicU64::new(0),
            duration_sum_us: AtomicU64::new(0),
            duration_min_us: AtomicU64::new(u64::MAX),
            duration_max_us: AtomicU64::new(0),
            history: RwLock::new(Vec::with_capacity(config.max_history)),
            events: RwLock::new(Vec::with_capacity(config.max_events)),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    // == Record ==
    /// Records one completed operation. Returns whether it was classified
    /// notable (slow, or flagged by the caller).
    pub fn record(
        &self,
        kind: K,
        descriptor: impl Into<String>,
        duration: Duration,
        success: bool,
    ) -> bool {
        self.record_with(kind, descriptor, duration, success, false)
    }

    /// Like [`record`](Self::record), with `flagged` forcing the notable
    /// classification (e.g. a rate-limit violation).
    pub fn record_with(
        &self,
        kind: K,
        descriptor: impl Into<String>,
        duration: Duration,
        success: bool,
        flagged: bool,
    ) -> bool {
        let micros = duration.as_micros().min(u64::MAX as u128) as u64;

        self.total.fetch_add(1, Ordering::Relaxed);
        if let Some(slot) = self.per_kind.get(kind.index()) {
            slot.fetch_add(1, Ordering::Relaxed);
        }
        if !success {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        let notable = flagged || duration > self.config.slow_threshold;
        if notable {
            self.notable.fetch_add(1, Ordering::Relaxed);
        }

        self.duration_sum_us.fetch_add(micros, Ordering::Relaxed);
        update_min(&self.duration_min_us, micros);
        update_max(&self.duration_max_us, micros);

        let record = OperationRecord {
            kind,
            descriptor: descriptor.into(),
            duration_ms: micros as f64 / 1000.0,
            success,
            notable,
            timestamp: Utc::now(),
        };

        if notable || !success {
            push_bounded(&self.events, record.clone(), self.config.max_events);
        }
        push_bounded(&self.history, record, self.config.max_history);

        notable
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn count(&self, kind: K) -> u64 {
        self.per_kind
            .get(kind.index())
            .map(|slot| slot.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn notable(&self) -> u64 {
        self.notable.load(Ordering::Relaxed)
    }

    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }

    // == Snapshot ==
    /// Copies counters and rings. Counters are read individually, so a
    /// snapshot racing with `record` may mix values from both sides.
    pub fn snapshot(&self) -> AggregateStats<K> {
        let total = self.total();
        let errors = self.errors();
        let notable = self.notable();
        let sum_us = self.duration_sum_us.load(Ordering::Relaxed);
        let min_us = self.duration_min_us.load(Ordering::Relaxed);
        let max_us = self.duration_max_us.load(Ordering::Relaxed);

        let by_kind = K::ALL
            .iter()
            .map(|&kind| KindCount {
                kind,
                count: self.count(kind),
            })
            .collect();

        AggregateStats {
            total,
            by_kind,
            errors,
            notable,
            error_rate: percentage(errors, total),
            notable_rate: percentage(notable, total),
            avg_duration_ms: if total == 0 {
                0.0
            } else {
                sum_us as f64 / total as f64 / 1000.0
            },
            min_duration_ms: if min_us == u64::MAX {
                0.0
            } else {
                min_us as f64 / 1000.0
            },
            max_duration_ms: max_us as f64 / 1000.0,
            recent_operations: self.history.read().clone(),
            notable_events: self.events.read().clone(),
        }
    }

    // == Windowed Metrics ==
    /// Statistics over history entries recorded within the last `window`.
    pub fn windowed(&self, window: Duration) -> WindowStats {
        self.windowed_where(window, |_| true)
    }

    /// Windowed statistics restricted to records accepted by `filter`.
    pub fn windowed_where<F>(&self, window: Duration, filter: F) -> WindowStats
    where
        F: Fn(&OperationRecord<K>) -> bool,
    {
        let now = Utc::now();
        let cutoff = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| now.checked_sub_signed(w));

        let (mut durations, errors) = {
            let history = self.history.read();
            let mut errors = 0u64;
            let durations: Vec<f64> = history
                .iter()
                .filter(|r| cutoff.map_or(true, |c| r.timestamp >= c) && r.timestamp <= now)
                .filter(|r| filter(r))
                .map(|r| {
                    if !r.success {
                        errors += 1;
                    }
                    r.duration_ms
                })
                .collect();
            (durations, errors)
        };

        if durations.is_empty() {
            return WindowStats {
                window_secs: window.as_secs_f64(),
                ..WindowStats::default()
            };
        }

        durations.sort_by(|a, b| a.total_cmp(b));
        let count = durations.len();
        let sum: f64 = durations.iter().sum();
        let window_secs = window.as_secs_f64();

        WindowStats {
            window_secs,
            count: count as u64,
            errors,
            avg_duration_ms: sum / count as f64,
            p95_duration_ms: percentile(&durations, 95.0),
            p99_duration_ms: percentile(&durations, 99.0),
            rate_per_sec: if window_secs > 0.0 {
                count as f64 / window_secs
            } else {
                0.0
            },
        }
    }

    /// Copies the history entries recorded within the last `window`.
    pub fn history_within(&self, window: Duration) -> Vec<OperationRecord<K>> {
        let cutoff = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| Utc::now().checked_sub_signed(w));
        self.history
            .read()
            .iter()
            .filter(|r| cutoff.map_or(true, |c| r.timestamp >= c))
            .cloned()
            .collect()
    }

    // == Reset ==
    /// Zeroes all counters and clears both rings.
    pub fn reset(&self) {
        // Hold both ring locks so no record lands half-reset in the rings
        let mut history = self.history.write();
        let mut events = self.events.write();

        self.total.store(0, Ordering::Relaxed);
        for slot in self.per_kind.iter() {
            slot.store(0, Ordering::Relaxed);
        }
        self.errors.store(0, Ordering::Relaxed);
        self.notable.store(0, Ordering::Relaxed);
        self.duration_sum_us.store(0, Ordering::Relaxed);
        self.duration_min_us.store(u64::MAX, Ordering::Relaxed);
        self.duration_max_us.store(0, Ordering::Relaxed);

        history.clear();
        events.clear();
    }
}

impl<K: OperationKind> Default for Aggregator<K> {
    fn default() -> Self {
        Self::new(AggregatorConfig::default())
    }
}

/// Appends to a bounded ring, dropping the oldest half in one compaction when
/// full so the amortized cost per append stays O(1).
fn push_bounded<T>(ring: &RwLock<Vec<T>>, item: T, max: usize) {
    let mut ring = ring.write();
    if ring.len() >= max {
        let drop = ring.len() / 2;
        ring.drain(..drop.max(1));
    }
    ring.push(item);
}

fn update_min(slot: &AtomicU64, value: u64) {
    let mut current = slot.load(Ordering::Relaxed);
    while value < current {
        match slot.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(actual) => current = actual,
        }
    }
}

fn update_max(slot: &AtomicU64, value: u64) {
    let mut current = slot.load(Ordering::Relaxed);
    while value > current {
        match slot.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(actual) => current = actual,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde::Serialize;
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub(crate) enum TestOp {
        Read,
        Write,
    }

    impl OperationKind for TestOp {
        const ALL: &'static [Self] = &[TestOp::Read, TestOp::Write];

        fn index(self) -> usize {
            self as usize
        }

        fn as_str(self) -> &'static str {
            match self {
                TestOp::Read => "read",
                TestOp::Write => "write",
            }
        }
    }

    fn small(max_history: usize, max_events: usize) -> Aggregator<TestOp> {
        Aggregator::new(AggregatorConfig {
            max_history,
            max_events,
            slow_threshold: Duration::from_millis(10),
        })
    }

    #[test]
    fn test_empty_snapshot_has_zero_rates() {
        let agg = small(10, 10);
        let stats = agg.snapshot();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.error_rate, 0.0);
        assert_eq!(stats.notable_rate, 0.0);
        assert_eq!(stats.avg_duration_ms, 0.0);
        assert_eq!(stats.min_duration_ms, 0.0);
        assert!(stats.recent_operations.is_empty());
    }

    #[test]
    fn test_record_updates_counters_and_durations() {
        let agg = small(10, 10);
        agg.record(TestOp::Read, "a", Duration::from_millis(2), true);
        agg.record(TestOp::Read, "b", Duration::from_millis(4), true);
        agg.record(TestOp::Write, "c", Duration::from_millis(6), false);

        let stats = agg.snapshot();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.count_of(TestOp::Read), 2);
        assert_eq!(stats.count_of(TestOp::Write), 1);
        assert_eq!(stats.errors, 1);
        assert!((stats.avg_duration_ms - 4.0).abs() < 1e-9);
        assert_eq!(stats.min_duration_ms, 2.0);
        assert_eq!(stats.max_duration_ms, 6.0);
        assert!((stats.error_rate - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_slow_and_failed_operations_are_logged_as_events() {
        let agg = small(10, 10);
        assert!(!agg.record(TestOp::Read, "fast", Duration::from_millis(1), true));
        assert!(agg.record(TestOp::Read, "slow", Duration::from_millis(50), true));
        assert!(!agg.record(TestOp::Write, "failed", Duration::from_millis(1), false));
        assert!(agg.record_with(TestOp::Write, "flagged", Duration::ZERO, true, true));

        let stats = agg.snapshot();
        assert_eq!(stats.notable, 2);
        let names: Vec<&str> = stats.notable_events.iter().map(|e| e.descriptor.as_str()).collect();
        assert_eq!(names, vec!["slow", "failed", "flagged"]);
    }

    #[test]
    fn test_history_compacts_oldest_half() {
        let agg = small(10, 4);
        for i in 0..11 {
            agg.record(TestOp::Read, format!("op{}", i), Duration::ZERO, true);
        }

        let stats = agg.snapshot();
        assert!(stats.recent_operations.len() <= 10);
        // At the 11th insert the 5 oldest were dropped
        assert_eq!(stats.recent_operations.len(), 6);
        assert_eq!(stats.recent_operations[0].descriptor, "op5");
        assert_eq!(stats.recent_operations.last().unwrap().descriptor, "op10");
        assert_eq!(stats.total, 11);
    }

    #[test]
    fn test_snapshot_is_a_deep_copy() {
        let agg = small(10, 10);
        agg.record(TestOp::Read, "a", Duration::ZERO, true);

        let mut stats = agg.snapshot();
        stats.recent_operations.clear();
        assert_eq!(agg.snapshot().recent_operations.len(), 1);
    }

    #[test]
    fn test_windowed_metrics() {
        let agg = small(200, 10);
        for ms in 1..=100 {
            agg.record(TestOp::Read, "q", Duration::from_millis(ms), ms % 10 != 0);
        }

        let window = agg.windowed(Duration::from_secs(60));
        assert_eq!(window.count, 100);
        assert_eq!(window.errors, 10);
        assert!((window.avg_duration_ms - 50.5).abs() < 1e-9);
        assert_eq!(window.p95_duration_ms, 95.0);
        assert_eq!(window.p99_duration_ms, 99.0);
        assert!((window.rate_per_sec - 100.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_windowed_metrics_empty_window() {
        let agg = small(10, 10);
        let window = agg.windowed(Duration::from_secs(5));
        assert_eq!(window.count, 0);
        assert_eq!(window.avg_duration_ms, 0.0);
        assert_eq!(window.p99_duration_ms, 0.0);
        assert_eq!(window.rate_per_sec, 0.0);
    }

    #[test]
    fn test_windowed_excludes_old_entries() {
        let agg = small(10, 10);
        agg.record(TestOp::Read, "old", Duration::ZERO, true);
        std::thread::sleep(Duration::from_millis(60));
        agg.record(TestOp::Read, "new", Duration::ZERO, true);

        assert_eq!(agg.windowed(Duration::from_millis(30)).count, 1);
        assert_eq!(agg.history_within(Duration::from_millis(30))[0].descriptor, "new");
    }

    #[test]
    fn test_reset() {
        let agg = small(10, 10);
        agg.record(TestOp::Write, "x", Duration::from_millis(50), false);
        agg.reset();

        let stats = agg.snapshot();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.notable, 0);
        assert_eq!(stats.count_of(TestOp::Write), 0);
        assert_eq!(stats.max_duration_ms, 0.0);
        assert!(stats.recent_operations.is_empty());
        assert!(stats.notable_events.is_empty());
    }

    #[test]
    fn test_concurrent_recording() {
        let agg = Arc::new(small(50, 10));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let agg = Arc::clone(&agg);
                std::thread::spawn(move || {
                    for i in 0..500u64 {
                        let kind = if i % 2 == 0 { TestOp::Read } else { TestOp::Write };
                        agg.record(kind, format!("t{}", t), Duration::from_micros(i), true);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = agg.snapshot();
        assert_eq!(stats.total, 4000);
        assert_eq!(stats.count_of(TestOp::Read) + stats.count_of(TestOp::Write), 4000);
        assert!(agg.history_len() <= 50);
        assert_eq!(stats.min_duration_ms, 0.0);
        assert_eq!(stats.max_duration_ms, 0.499);
    }
}
