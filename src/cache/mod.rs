//! Cache Module
//!
//! Backend-agnostic cache abstraction with an in-memory and a Redis backend.
//!
//! Every higher component depends on the [`Cache`] trait only, so tests run
//! against [`MemoryCache`] while deployments use [`RedisCache`].

mod codec;
mod entry;
mod instrumented;
mod lru;
mod memory;
mod pattern;
mod redis_backend;
mod stats;
mod store;


use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::CacheResult;

// Re-export public types
pub use codec::CacheExt;
pub use entry::{current_timestamp_ms, CacheEntry};
pub use instrumented::InstrumentedCache;
pub use lru::LruTracker;
pub use memory::MemoryCache;
pub use pattern::glob_match;
pub use redis_backend::RedisCache;
pub use stats::{BackendHealth, BackendStats};
pub use store::CacheStore;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 1024;

/// TTL meaning "never expires"
pub const NO_EXPIRY: Duration = Duration::ZERO;

// == Cache Trait ==
/// Contract every cache backend implements.
///
/// TTLs of `Duration::ZERO` mean no expiry. Deleting a missing key is not an
/// error. Futures may be dropped to cancel a call; backends bound each call
/// with their own deadline.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Backend name used in logs and health reports.
    fn backend_name(&self) -> &'static str;

    /// Fetches raw bytes, surfacing backend failures.
    async fn try_get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Fetches raw bytes with the remaining TTL (`None` = no expiry).
    async fn try_get_with_ttl(&self, key: &str)
        -> CacheResult<Option<(Vec<u8>, Option<Duration>)>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()>;

    /// Stores every item under one shared TTL.
    async fn set_multiple(&self, items: Vec<(String, Vec<u8>)>, ttl: Duration) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    async fn delete_multiple(&self, keys: &[String]) -> CacheResult<()>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Lists keys matching a glob pattern (`*`, `?`, `[...]`).
    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>>;

    async fn clear(&self) -> CacheResult<()>;

    /// Atomically adds `amount` to an integer value, creating it at zero.
    /// An existing expiry is preserved.
    async fn increment(&self, key: &str, amount: i64) -> CacheResult<i64>;

    /// Like [`Cache::increment`], but a counter that is created, or found
    /// without an expiry, is given `ttl` in the same atomic step.
    async fn increment_with_ttl(&self, key: &str, amount: i64, ttl: Duration)
        -> CacheResult<i64>;

    async fn decrement(&self, key: &str, amount: i64) -> CacheResult<i64> {
        self.increment(key, -amount).await
    }

    /// Stores the value only if the key is absent. Returns whether it was set.
    async fn set_if_not_exists(&self, key: &str, value: Vec<u8>, ttl: Duration)
        -> CacheResult<bool>;

    async fn health(&self) -> BackendHealth;

    async fn stats(&self) -> CacheResult<BackendStats>;

    // == Infallible reads ==
    /// Fetches raw bytes. A backend failure is logged and reported as a miss
    /// so callers fall back to the source of truth.
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, backend = self.backend_name(), error = %e, "cache get failed, treating as miss");
                None
            }
        }
    }

    /// Like [`Cache::get`] but also returns the remaining TTL.
    async fn get_with_ttl(&self, key: &str) -> Option<(Vec<u8>, Option<Duration>)> {
        match self.try_get_with_ttl(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, backend = self.backend_name(), error = %e, "cache get_with_ttl failed, treating as miss");
                None
            }
        }
    }
}
