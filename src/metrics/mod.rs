//! Metrics Module
//!
//! One generic [`Aggregator`] engine, instantiated for cache operations,
//! backing-store queries and rate-limiter decisions. Each instance is built
//! once at startup and handed to the component it instruments.

mod aggregator;
mod cache_metrics;
mod query_metrics;
mod rate_limit;
mod record;
mod violations;

#[cfg(test)]
mod property_tests;

pub use aggregator::{Aggregator, AggregatorConfig, DEFAULT_EVENT_SIZE, DEFAULT_HISTORY_SIZE};
pub use cache_metrics::{CacheMetrics, CacheOp, CacheStatsSnapshot};
pub use query_metrics::{QueryKind, QueryMetrics, QueryStatsSnapshot};
pub use rate_limit::{
    effectiveness_score, RateLimitMetrics, RateLimitStatsSnapshot, RateLimitWindowStats, RateScope,
    HOTSPOT_MIN_VIOLATION_RATE, IP_HOTSPOT_MIN_REQUESTS, USER_HOTSPOT_MIN_REQUESTS,
};
pub use record::{
    percentage, percentile, AggregateStats, KindCount, OperationKind, OperationRecord, WindowStats,
};
pub use violations::{Hotspot, ViolationTracker, VIOLATION_RETENTION};
