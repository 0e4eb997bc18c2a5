//! In-memory cache backend.
//!
//! Shares one [`CacheStore`] behind an async RwLock. Used as the test double
//! for every cache consumer and as the fallback when no Redis URL is configured.
//!
//! Lookups returning a value take the write lock, since they update LRU order
//! and hit/miss stats, so concurrent `get`s are serialized. `exists`, `keys`,
//! `stats` and `health` only take the read lock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BackendHealth, BackendStats, Cache, CacheStore};
use crate::error::CacheResult;

#[derive(Clone, Debug)]
pub struct MemoryCache {
    store: Arc<RwLock<CacheStore>>,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(CacheStore::new(max_entries))),
        }
    }

    /// A cache that never evicts, for entries that must live out their TTL
    /// such as revocations.
    pub fn unbounded() -> Self {
        Self {
            store: Arc::new(RwLock::new(CacheStore::unbounded())),
        }
    }

    /// Removes expired entries. Called by the background sweeper.
    pub async fn cleanup_expired(&self) -> usize {
        self.store.write().await.cleanup_expired()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn try_get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        // Write lock: reads touch LRU order and stats
        let mut store = self.store.write().await;
        Ok(store.get(key).map(|(value, _)| value))
    }

    async fn try_get_with_ttl(
        &self,
        key: &str,
    ) -> CacheResult<Option<(Vec<u8>, Option<Duration>)>> {
        let mut store = self.store.write().await;
        Ok(store.get(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        self.store.write().await.set(key, value, ttl)
    }

    async fn set_multiple(&self, items: Vec<(String, Vec<u8>)>, ttl: Duration) -> CacheResult<()> {
        let mut store = self.store.write().await;
        for (key, value) in items {
            store.set(&key, value, ttl)?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.store.write().await.delete(key);
        Ok(())
    }

    async fn delete_multiple(&self, keys: &[String]) -> CacheResult<()> {
        let mut store = self.store.write().await;
        for key in keys {
            store.delete(key);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.store.read().await.contains_live(key))
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        Ok(self.store.read().await.keys(pattern))
    }

    async fn clear(&self) -> CacheResult<()> {
        self.store.write().await.clear();
        Ok(())
    }

    async fn increment(&self, key: &str, amount: i64) -> CacheResult<i64> {
        self.store.write().await.increment(key, amount)
    }

    async fn increment_with_ttl(&self, key: &str, amount: i64, ttl: Duration) -> CacheResult<i64> {
        self.store
            .write()
            .await
            .increment_with_ttl(key, amount, ttl)
    }

    async fn set_if_not_exists(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> CacheResult<bool> {
        self.store.write().await.set_if_not_exists(key, value, ttl)
    }

    async fn health(&self) -> BackendHealth {
        let started = Instant::now();
        let _guard = self.store.read().await;
        BackendHealth::healthy("memory", started.elapsed().as_secs_f64() * 1000.0)
    }

    async fn stats(&self) -> CacheResult<BackendStats> {
        Ok(self.store.read().await.stats())
    }
}
