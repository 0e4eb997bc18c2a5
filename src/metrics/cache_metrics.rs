//! Cache operation metrics: hit/miss accounting on top of the generic aggregator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use super::record::{percentage, AggregateStats, OperationKind, WindowStats};
use super::{Aggregator, AggregatorConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOp {
    Get,
    Set,
    Delete,
    Exists,
    Keys,
    Clear,
    Increment,
    SetIfNotExists,
}

impl OperationKind for CacheOp {
    const ALL: &'static [Self] = &[
        CacheOp::Get,
        CacheOp::Set,
        CacheOp::Delete,
        CacheOp::Exists,
        CacheOp::Keys,
        CacheOp::Clear,
        CacheOp::Increment,
        CacheOp::SetIfNotExists,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn as_str(self) -> &'static str {
        match self {
            CacheOp::Get => "get",
            CacheOp::Set => "set",
            CacheOp::Delete => "delete",
            CacheOp::Exists => "exists",
            CacheOp::Keys => "keys",
            CacheOp::Clear => "clear",
            CacheOp::Increment => "increment",
            CacheOp::SetIfNotExists => "set_if_not_exists",
        }
    }
}

/// Hit/miss and per-operation statistics for one cache instance.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    ops: Aggregator<CacheOp>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Exposed cache statistics. `hits + misses == total_requests`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsSnapshot {
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub operations: AggregateStats<CacheOp>,
}

impl CacheMetrics {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            ops: Aggregator::new(config),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn record_hit(&self, key: &str, duration: Duration) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.ops.record(CacheOp::Get, key, duration, true);
    }

    /// Records a lookup that found nothing. `success` is false when the miss
    /// was caused by a backend failure.
    pub fn record_miss(&self, key: &str, duration: Duration, success: bool) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.ops.record(CacheOp::Get, key, duration, success);
    }

    /// Records any non-lookup operation.
    pub fn record_op(&self, op: CacheOp, key: &str, duration: Duration, success: bool) {
        self.ops.record(op, key, duration, success);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let hits = self.hits();
        let misses = self.misses();
        let total_requests = hits + misses;
        CacheStatsSnapshot {
            total_requests,
            hits,
            misses,
            hit_rate: percentage(hits, total_requests),
            miss_rate: percentage(misses, total_requests),
            operations: self.ops.snapshot(),
        }
    }

    pub fn windowed(&self, window: Duration) -> WindowStats {
        self.ops.windowed(window)
    }

    pub fn reset(&self) {
        self.ops.reset();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}
