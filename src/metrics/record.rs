//! Operation records and the derived statistics reported by aggregators.

use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Operation Kind ==
/// Category of operation tracked by an [`Aggregator`](super::Aggregator).
///
/// Each instrumented subsystem defines a small closed enum; `index` maps it to
/// its dedicated counter slot.
pub trait OperationKind:
    Copy + Eq + Hash + Debug + Serialize + Send + Sync + 'static
{
    /// Every variant, in counter-slot order.
    const ALL: &'static [Self];

    fn index(self) -> usize;

    fn as_str(self) -> &'static str;
}

// == Operation Record ==
/// One completed operation in an aggregator's rolling history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRecord<K: OperationKind> {
    pub kind: K,
    /// Key, query name or identifier the operation acted on
    pub descriptor: String,
    pub duration_ms: f64,
    pub success: bool,
    /// Set when the record crossed a classification threshold (slow, violation)
    pub notable: bool,
    pub timestamp: DateTime<Utc>,
}

impl<K: OperationKind> OperationRecord<K> {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_ms / 1000.0)
    }
}

// == Kind Count ==
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindCount<K: OperationKind> {
    pub kind: K,
    pub count: u64,
}

// == Aggregate Stats ==
/// Point-in-time copy of an aggregator's counters and rings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateStats<K: OperationKind> {
    pub total: u64,
    pub by_kind: Vec<KindCount<K>>,
    pub errors: u64,
    pub notable: u64,
    /// errors / total * 100, 0 when total is 0
    pub error_rate: f64,
    /// notable / total * 100, 0 when total is 0
    pub notable_rate: f64,
    pub avg_duration_ms: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
    pub recent_operations: Vec<OperationRecord<K>>,
    pub notable_events: Vec<OperationRecord<K>>,
}

impl<K: OperationKind> AggregateStats<K> {
    pub fn count_of(&self, kind: K) -> u64 {
        self.by_kind
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.count)
            .unwrap_or(0)
    }
}

// == Window Stats ==
/// Statistics over the history entries inside a trailing time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WindowStats {
    pub window_secs: f64,
    pub count: u64,
    pub errors: u64,
    pub avg_duration_ms: f64,
    pub p95_duration_ms: f64,
    pub p99_duration_ms: f64,
    /// Operations per second across the window
    pub rate_per_sec: f64,
}

/// `part / whole * 100`, defined as 0 when `whole` is 0.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Nearest-rank percentile of an ascending slice. Returns 0 for an empty slice.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (pct / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
