//! Backend Statistics Module
//!
//! Introspection data reported by a cache backend for the exposition layer.

use serde::Serialize;

// == Backend Stats ==
/// Backend-side counters. Redis reports its keyspace counters here; the
/// in-memory backend keeps its own.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BackendStats {
    /// Backend identifier ("memory", "redis")
    pub backend: String,
    /// Successful lookups seen by the backend
    pub hits: u64,
    /// Lookups of absent or expired keys
    pub misses: u64,
    /// Entries evicted to respect capacity
    pub evictions: u64,
    /// Entries expired by TTL
    pub expirations: u64,
    /// Current number of stored keys
    pub total_entries: usize,
}

impl BackendStats {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            ..Self::default()
        }
    }

    // == Hit Rate ==
    /// Percentage of lookups that hit, or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

// == Backend Health ==
/// Result of a backend liveness check.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BackendHealth {
    pub backend: String,
    pub healthy: bool,
    /// Round-trip latency of the check in milliseconds
    pub latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl BackendHealth {
    pub fn healthy(backend: impl Into<String>, latency_ms: f64) -> Self {
        Self {
            backend: backend.into(),
            healthy: true,
            latency_ms,
            detail: None,
        }
    }

    pub fn unhealthy(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            healthy: false,
            latency_ms: 0.0,
            detail: Some(detail.into()),
        }
    }
}
