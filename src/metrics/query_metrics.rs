//! Backing-store query performance metrics.

use std::time::Duration;

use serde::Serialize;

use super::record::{percentage, AggregateStats, OperationKind, OperationRecord, WindowStats};
use super::{Aggregator, AggregatorConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
    Count,
    Exists,
}

impl OperationKind for QueryKind {
    const ALL: &'static [Self] = &[
        QueryKind::Select,
        QueryKind::Insert,
        QueryKind::Update,
        QueryKind::Delete,
        QueryKind::Count,
        QueryKind::Exists,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn as_str(self) -> &'static str {
        match self {
            QueryKind::Select => "select",
            QueryKind::Insert => "insert",
            QueryKind::Update => "update",
            QueryKind::Delete => "delete",
            QueryKind::Count => "count",
            QueryKind::Exists => "exists",
        }
    }
}

#[derive(Debug, Default)]
pub struct QueryMetrics {
    queries: Aggregator<QueryKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryStatsSnapshot {
    pub total_queries: u64,
    pub slow_queries: u64,
    pub failed_queries: u64,
    pub slow_rate: f64,
    pub error_rate: f64,
    pub avg_duration_ms: f64,
    pub max_duration_ms: f64,
    pub slow_threshold_ms: f64,
    pub slow_query_log: Vec<OperationRecord<QueryKind>>,
    pub operations: AggregateStats<QueryKind>,
}

impl QueryMetrics {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            queries: Aggregator::new(config),
        }
    }

    /// Records one query. Returns true when it exceeded the slow threshold.
    pub fn record_query(
        &self,
        kind: QueryKind,
        query: &str,
        duration: Duration,
        success: bool,
    ) -> bool {
        let slow = self.queries.record(kind, query, duration, success);
        if slow {
            tracing::warn!(
                query,
                duration_ms = duration.as_secs_f64() * 1000.0,
                "slow query"
            );
        }
        slow
    }

    pub fn snapshot(&self) -> QueryStatsSnapshot {
        let operations = self.queries.snapshot();
        let slow_query_log = operations
            .notable_events
            .iter()
            .filter(|e| e.notable)
            .cloned()
            .collect();

        QueryStatsSnapshot {
            total_queries: operations.total,
            slow_queries: operations.notable,
            failed_queries: operations.errors,
            slow_rate: percentage(operations.notable, operations.total),
            error_rate: percentage(operations.errors, operations.total),
            avg_duration_ms: operations.avg_duration_ms,
            max_duration_ms: operations.max_duration_ms,
            slow_threshold_ms: self.queries.config().slow_threshold.as_secs_f64() * 1000.0,
            slow_query_log,
            operations,
        }
    }

    pub fn windowed(&self, window: Duration) -> WindowStats {
        self.queries.windowed(window)
    }

    pub fn reset(&self) {
        self.queries.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> QueryMetrics {
        QueryMetrics::new(AggregatorConfig {
            slow_threshold: Duration::from_millis(100),
            ..AggregatorConfig::default()
        })
    }

    #[test]
    fn test_slow_query_classification() {
        let metrics = metrics();
        assert!(!metrics.record_query(QueryKind::Select, "users.get_by_id", Duration::from_millis(5), true));
        assert!(metrics.record_query(QueryKind::Select, "users.get_all", Duration::from_millis(250), true));
        metrics.record_query(QueryKind::Insert, "users.create", Duration::from_millis(3), false);

        let stats = metrics.snapshot();
        assert_eq!(stats.total_queries, 3);
        assert_eq!(stats.slow_queries, 1);
        assert_eq!(stats.failed_queries, 1);
        assert_eq!(stats.slow_query_log.len(), 1);
        assert_eq!(stats.slow_query_log[0].descriptor, "users.get_all");
        assert_eq!(stats.slow_threshold_ms, 100.0);
        assert!((stats.slow_rate - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_snapshot() {
        let stats = metrics().snapshot();
        assert_eq!(stats.slow_rate, 0.0);
        assert_eq!(stats.error_rate, 0.0);
        assert_eq!(stats.avg_duration_ms, 0.0);
    }
}
