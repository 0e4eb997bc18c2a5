//! Metrics decorator for any [`Cache`] backend.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{BackendHealth, BackendStats, Cache};
use crate::error::CacheResult;
use crate::metrics::{CacheMetrics, CacheOp};

/// Wraps a backend and records every call into [`CacheMetrics`].
///
/// Lookups count as hits or misses; a failed lookup counts as an
/// unsuccessful miss. Batch calls are recorded once with the first key
/// as descriptor.
pub struct InstrumentedCache<C> {
    inner: C,
    metrics: Arc<CacheMetrics>,
}

impl<C: Cache> InstrumentedCache<C> {
    pub fn new(inner: C, metrics: Arc<CacheMetrics>) -> Self {
        Self { inner, metrics }
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn timed<T, F>(&self, op: CacheOp, key: &str, fut: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>> + Send,
    {
        let started = Instant::now();
        let result = fut.await;
        self.metrics
            .record_op(op, key, started.elapsed(), result.is_ok());
        result
    }

    fn record_lookup<T>(&self, key: &str, elapsed: Duration, result: &CacheResult<Option<T>>) {
        match result {
            Ok(Some(_)) => self.metrics.record_hit(key, elapsed),
            Ok(None) => self.metrics.record_miss(key, elapsed, true),
            Err(_) => self.metrics.record_miss(key, elapsed, false),
        }
    }
}

fn batch_descriptor<'a>(mut keys: impl Iterator<Item = &'a str>, len: usize) -> String {
    match keys.next() {
        Some(first) if len > 1 => format!("{} (+{})", first, len - 1),
        Some(first) => first.to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl<C: Cache> Cache for InstrumentedCache<C> {
    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    async fn try_get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let started = Instant::now();
        let result = self.inner.try_get(key).await;
        self.record_lookup(key, started.elapsed(), &result);
        result
    }

    async fn try_get_with_ttl(
        &self,
        key: &str,
    ) -> CacheResult<Option<(Vec<u8>, Option<Duration>)>> {
        let started = Instant::now();
        let result = self.inner.try_get_with_ttl(key).await;
        self.record_lookup(key, started.elapsed(), &result);
        result
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        self.timed(CacheOp::Set, key, self.inner.set(key, value, ttl))
            .await
    }

    async fn set_multiple(&self, items: Vec<(String, Vec<u8>)>, ttl: Duration) -> CacheResult<()> {
        let descriptor = batch_descriptor(items.iter().map(|(k, _)| k.as_str()), items.len());
        self.timed(CacheOp::Set, &descriptor, self.inner.set_multiple(items, ttl))
            .await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.timed(CacheOp::Delete, key, self.inner.delete(key)).await
    }

    async fn delete_multiple(&self, keys: &[String]) -> CacheResult<()> {
        let descriptor = batch_descriptor(keys.iter().map(String::as_str), keys.len());
        self.timed(CacheOp::Delete, &descriptor, self.inner.delete_multiple(keys))
            .await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.timed(CacheOp::Exists, key, self.inner.exists(key)).await
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.timed(CacheOp::Keys, pattern, self.inner.keys(pattern))
            .await
    }

    async fn clear(&self) -> CacheResult<()> {
        self.timed(CacheOp::Clear, "*", self.inner.clear()).await
    }

    async fn increment(&self, key: &str, amount: i64) -> CacheResult<i64> {
        self.timed(CacheOp::Increment, key, self.inner.increment(key, amount))
            .await
    }

    async fn increment_with_ttl(&self, key: &str, amount: i64, ttl: Duration) -> CacheResult<i64> {
        self.timed(
            CacheOp::Increment,
            key,
            self.inner.increment_with_ttl(key, amount, ttl),
        )
        .await
    }

    async fn set_if_not_exists(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> CacheResult<bool> {
        self.timed(
            CacheOp::SetIfNotExists,
            key,
            self.inner.set_if_not_exists(key, value, ttl),
        )
        .await
    }

    async fn health(&self) -> BackendHealth {
        self.inner.health().await
    }

    async fn stats(&self) -> CacheResult<BackendStats> {
        self.inner.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheExt, MemoryCache, NO_EXPIRY};

    fn instrumented() -> InstrumentedCache<MemoryCache> {
        InstrumentedCache::new(MemoryCache::new(100), Arc::new(CacheMetrics::default()))
    }

    #[tokio::test]
    async fn test_lookups_are_counted() {
        let cache = instrumented();
        cache.set_string("a", "1", NO_EXPIRY).await.unwrap();

        assert!(cache.get("a").await.is_some());
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());

        let stats = cache.metrics().snapshot();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 75.0);
        assert_eq!(stats.operations.count_of(CacheOp::Set), 1);
    }

    #[tokio::test]
    async fn test_json_reads_go_through_metrics() {
        let cache = instrumented();
        cache.set_json("n", &42u32, NO_EXPIRY).await.unwrap();
        assert_eq!(cache.get_json::<u32>("n").await, Some(42));
        assert_eq!(cache.metrics().hits(), 1);
    }

    #[tokio::test]
    async fn test_failed_calls_are_errors() {
        let cache = instrumented();
        cache.set_string("word", "abc", NO_EXPIRY).await.unwrap();
        assert!(cache.increment("word", 1).await.is_err());

        let stats = cache.metrics().snapshot();
        assert_eq!(stats.operations.errors, 1);
        assert_eq!(stats.operations.notable_events.len(), 1);
        assert_eq!(stats.operations.notable_events[0].descriptor, "word");
    }

    #[tokio::test]
    async fn test_batch_descriptor() {
        let cache = instrumented();
        cache
            .delete_multiple(&["x".to_string(), "y".to_string(), "z".to_string()])
            .await
            .unwrap();

        let stats = cache.metrics().snapshot();
        assert_eq!(stats.operations.recent_operations[0].descriptor, "x (+2)");
    }
}
