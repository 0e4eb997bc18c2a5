//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cachelayer::cache::{BackendHealth, BackendStats, Cache, MemoryCache};
use cachelayer::error::{CacheError, CacheResult};

pub const SECRET: &str = "integration-secret";

/// In-memory cache that can be switched into a failing state.
#[derive(Clone)]
pub struct FailingCache {
    inner: MemoryCache,
    down: Arc<AtomicBool>,
}

impl FailingCache {
    pub fn new() -> Self {
        Self {
            inner: MemoryCache::new(1000),
            down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> CacheResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(CacheError::Backend("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Cache for FailingCache {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn try_get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.check()?;
        self.inner.try_get(key).await
    }

    async fn try_get_with_ttl(
        &self,
        key: &str,
    ) -> CacheResult<Option<(Vec<u8>, Option<Duration>)>> {
        self.check()?;
        self.inner.try_get_with_ttl(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn set_multiple(&self, items: Vec<(String, Vec<u8>)>, ttl: Duration) -> CacheResult<()> {
        self.check()?;
        self.inner.set_multiple(items, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn delete_multiple(&self, keys: &[String]) -> CacheResult<()> {
        self.check()?;
        self.inner.delete_multiple(keys).await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.check()?;
        self.inner.exists(key).await
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.check()?;
        self.inner.keys(pattern).await
    }

    async fn clear(&self) -> CacheResult<()> {
        self.check()?;
        self.inner.clear().await
    }

    async fn increment(&self, key: &str, amount: i64) -> CacheResult<i64> {
        self.check()?;
        self.inner.increment(key, amount).await
    }

    async fn increment_with_ttl(&self, key: &str, amount: i64, ttl: Duration) -> CacheResult<i64> {
        self.check()?;
        self.inner.increment_with_ttl(key, amount, ttl).await
    }

    async fn set_if_not_exists(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> CacheResult<bool> {
        self.check()?;
        self.inner.set_if_not_exists(key, value, ttl).await
    }

    async fn health(&self) -> BackendHealth {
        match self.check() {
            Ok(()) => BackendHealth::healthy(self.backend_name(), 0.0),
            Err(e) => BackendHealth::unhealthy(self.backend_name(), e.to_string()),
        }
    }

    async fn stats(&self) -> CacheResult<BackendStats> {
        self.check()?;
        self.inner.stats().await
    }
}
