//! Configuration Module
//!
//! Handles loading and managing configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::metrics::AggregatorConfig;

/// Behaviour of token validation when the denylist backend itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailMode {
    /// Log the failure and continue to normal validation
    Open,
    /// Reject the token while the denylist cannot be consulted
    Closed,
}

impl FromStr for FailMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(FailMode::Open),
            "closed" => Ok(FailMode::Closed),
            other => Err(format!("unknown fail mode '{}'", other)),
        }
    }
}

/// Layer configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP port of the stats exposition server
    pub server_port: u16,
    /// Redis-compatible cache URL; `None` selects the in-memory backend
    pub cache_url: Option<String>,
    /// Capacity of the in-memory backend
    pub cache_max_entries: usize,
    /// Deadline for a single cache backend call, in milliseconds
    pub cache_op_timeout_ms: u64,
    /// TTL in seconds for entries populated by the cache-aside repository
    pub repository_cache_ttl: u64,
    /// Bound of each aggregator's operation history
    pub metrics_history_size: usize,
    /// Bound of each aggregator's notable-event log
    pub metrics_event_size: usize,
    /// Cache operations slower than this are logged as slow
    pub slow_cache_op_ms: u64,
    /// Store queries slower than this are logged as slow
    pub slow_query_ms: u64,
    /// Requests allowed per identifier per window
    pub rate_limit_requests: u64,
    /// Rate limit window length in seconds
    pub rate_limit_window_secs: u64,
    /// Key rate limits on `X-Forwarded-For`; only safe behind a proxy that
    /// overwrites the header
    pub trust_forwarded_for: bool,
    /// Validation behaviour when the denylist backend fails
    pub denylist_fail_mode: FailMode,
    /// HMAC secret for token signing
    pub jwt_secret: String,
    /// Background sweeper interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` (default: 3000)
    /// - `CACHE_URL` (default: unset, in-memory backend)
    /// - `CACHE_MAX_ENTRIES` (default: 10000)
    /// - `CACHE_OP_TIMEOUT_MS` (default: 500)
    /// - `REPOSITORY_CACHE_TTL` seconds (default: 300)
    /// - `METRICS_HISTORY_SIZE` (default: 1000)
    /// - `METRICS_EVENT_SIZE` (default: 100)
    /// - `SLOW_CACHE_OP_MS` (default: 50)
    /// - `SLOW_QUERY_MS` (default: 100)
    /// - `RATE_LIMIT_REQUESTS` (default: 100)
    /// - `RATE_LIMIT_WINDOW_SECS` (default: 60)
    /// - `TRUST_FORWARDED_FOR` (default: false)
    /// - `DENYLIST_FAIL_MODE` `open` or `closed` (default: open)
    /// - `JWT_SECRET`
    /// - `CLEANUP_INTERVAL` seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cache_url: env::var("CACHE_URL").ok().filter(|v| !v.trim().is_empty()),
            cache_max_entries: env_or("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            cache_op_timeout_ms: env_or("CACHE_OP_TIMEOUT_MS", defaults.cache_op_timeout_ms),
            repository_cache_ttl: env_or("REPOSITORY_CACHE_TTL", defaults.repository_cache_ttl),
            metrics_history_size: env_or("METRICS_HISTORY_SIZE", defaults.metrics_history_size),
            metrics_event_size: env_or("METRICS_EVENT_SIZE", defaults.metrics_event_size),
            slow_cache_op_ms: env_or("SLOW_CACHE_OP_MS", defaults.slow_cache_op_ms),
            slow_query_ms: env_or("SLOW_QUERY_MS", defaults.slow_query_ms),
            rate_limit_requests: env_or("RATE_LIMIT_REQUESTS", defaults.rate_limit_requests),
            rate_limit_window_secs: env_or(
                "RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window_secs,
            ),
            trust_forwarded_for: env_or("TRUST_FORWARDED_FOR", defaults.trust_forwarded_for),
            denylist_fail_mode: env_or("DENYLIST_FAIL_MODE", defaults.denylist_fail_mode),
            jwt_secret: env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
        }
    }

    pub fn cache_op_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_op_timeout_ms)
    }

    pub fn repository_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.repository_cache_ttl)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Aggregator bounds from this config with the given slow threshold.
    pub fn metrics_config(&self, slow_threshold_ms: u64) -> AggregatorConfig {
        AggregatorConfig {
            max_history: self.metrics_history_size,
            max_events: self.metrics_event_size,
            slow_threshold: Duration::from_millis(slow_threshold_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cache_url: None,
            cache_max_entries: 10_000,
            cache_op_timeout_ms: 500,
            repository_cache_ttl: 300,
            metrics_history_size: 1000,
            metrics_event_size: 100,
            slow_cache_op_ms: 50,
            slow_query_ms: 100,
            rate_limit_requests: 100,
            rate_limit_window_secs: 60,
            trust_forwarded_for: false,
            denylist_fail_mode: FailMode::Open,
            jwt_secret: "change-me".to_string(),
            cleanup_interval: 1,
        }
    }
}

/// Parses an environment variable, falling back to `default` when it is
/// unset or unparseable.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
