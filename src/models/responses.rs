//! Response DTOs for the stats exposition API
//!
//! Rates are percentages in 0..=100; recent-operation lists are bounded by
//! the aggregator that produced them.

use serde::Serialize;

use crate::cache::{BackendHealth, BackendStats};
use crate::metrics::{
    CacheStatsSnapshot, QueryStatsSnapshot, RateLimitStatsSnapshot, RateLimitWindowStats,
    WindowStats,
};

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy", "degraded" (cache down) or "unhealthy" (store down)
    pub status: String,
    pub cache: BackendHealth,
    pub store: StoreHealth,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreHealth {
    pub healthy: bool,
    pub latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthResponse {
    pub fn new(cache: BackendHealth, store: StoreHealth) -> Self {
        let status = match (store.healthy, cache.healthy) {
            (false, _) => "unhealthy",
            (true, false) => "degraded",
            (true, true) => "healthy",
        };
        Self {
            status: status.to_string(),
            cache,
            store,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn is_serving(&self) -> bool {
        self.store.healthy
    }
}

/// Response body for GET /stats/cache
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    /// Backend-side counters; absent when the backend cannot be reached
    pub backend: Option<BackendStats>,
    #[serde(flatten)]
    pub metrics: CacheStatsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowStats>,
}

/// Response body for GET /stats/db
#[derive(Debug, Clone, Serialize)]
pub struct QueryStatsResponse {
    #[serde(flatten)]
    pub metrics: QueryStatsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowStats>,
}

/// Response body for GET /stats/rate-limit
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatsResponse {
    #[serde(flatten)]
    pub metrics: RateLimitStatsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<RateLimitWindowStats>,
}

/// Response body for POST /stats/reset
#[derive(Debug, Clone, Serialize)]
pub struct ResetResponse {
    pub message: String,
    pub timestamp: String,
}

impl ResetResponse {
    pub fn new() -> Self {
        Self {
            message: "Metrics reset successfully".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl Default for ResetResponse {
    fn default() -> Self {
        Self::new()
    }
}
