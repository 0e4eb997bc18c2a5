//! Redis-backed cache.
//!
//! Uses a multiplexed `ConnectionManager` that reconnects on its own. Every
//! command is bounded by the configured operation timeout.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use super::{BackendHealth, BackendStats, Cache};
use crate::error::{CacheError, CacheResult};

/// Keys fetched per SCAN round trip.
const SCAN_BATCH: usize = 500;

/// INCRBY plus PEXPIRE on a counter without expiry, run as one script so a
/// counter can never be left behind without a TTL.
const INCR_WITH_TTL: &str = r"
local value = redis.call('INCRBY', KEYS[1], ARGV[1])
if redis.call('PTTL', KEYS[1]) == -1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return value
";

#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
    op_timeout: Duration,
}

impl RedisCache {
    /// Connects to a Redis-compatible server.
    pub async fn connect(url: &str, op_timeout: Duration) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let manager = tokio::time::timeout(op_timeout * 4, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Timeout(op_timeout.as_millis() as u64 * 4))??;

        info!(url, timeout_ms = op_timeout.as_millis() as u64, "Redis cache connected");
        Ok(Self {
            manager,
            op_timeout,
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Runs a command future under the operation deadline.
    async fn bounded<T, F>(&self, fut: F) -> CacheResult<T>
    where
        F: Future<Output = redis::RedisResult<T>> + Send,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout(self.op_timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn try_get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn();
        self.bounded(async move { conn.get::<_, Option<Vec<u8>>>(key).await })
            .await
    }

    async fn try_get_with_ttl(
        &self,
        key: &str,
    ) -> CacheResult<Option<(Vec<u8>, Option<Duration>)>> {
        let mut pipe = redis::pipe();
        pipe.get(key).pttl(key);

        let mut conn = self.conn();
        let (value, pttl): (Option<Vec<u8>>, i64) = self
            .bounded(async move { pipe.query_async(&mut conn).await })
            .await?;

        Ok(value.map(|v| (v, ttl_from_pttl(pttl))))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn();
        self.bounded(async move {
            if ttl.is_zero() {
                conn.set::<_, _, ()>(key, value).await
            } else {
                conn.pset_ex::<_, _, ()>(key, value, ttl_millis(ttl)).await
            }
        })
        .await
    }

    async fn set_multiple(&self, items: Vec<(String, Vec<u8>)>, ttl: Duration) -> CacheResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in &items {
            if ttl.is_zero() {
                pipe.set(key, value.as_slice()).ignore();
            } else {
                pipe.pset_ex(key, value.as_slice(), ttl_millis(ttl)).ignore();
            }
        }

        let mut conn = self.conn();
        self.bounded(async move { pipe.query_async::<()>(&mut conn).await })
            .await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn();
        self.bounded(async move { conn.del::<_, ()>(key).await })
            .await
    }

    async fn delete_multiple(&self, keys: &[String]) -> CacheResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();
        let keys = keys.to_vec();
        self.bounded(async move { conn.del::<_, ()>(keys).await })
            .await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn();
        self.bounded(async move { conn.exists::<_, bool>(key).await })
            .await
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        // SCAN instead of KEYS so a large keyspace never blocks the server
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let mut conn = self.conn();
            let (next, batch): (u64, Vec<String>) = self
                .bounded(async move {
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn)
                        .await
                })
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        keys.sort();
        keys.dedup();
        debug!(pattern, matched = keys.len(), "scanned keys");
        Ok(keys)
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut conn = self.conn();
        self.bounded(async move { redis::cmd("FLUSHDB").query_async::<()>(&mut conn).await })
            .await
    }

    async fn increment(&self, key: &str, amount: i64) -> CacheResult<i64> {
        let mut conn = self.conn();
        self.bounded(async move { conn.incr::<_, _, i64>(key, amount).await })
            .await
    }

    async fn increment_with_ttl(&self, key: &str, amount: i64, ttl: Duration) -> CacheResult<i64> {
        if ttl.is_zero() {
            return self.increment(key, amount).await;
        }
        let mut conn = self.conn();
        self.bounded(async move {
            let value: redis::RedisResult<i64> = redis::Script::new(INCR_WITH_TTL)
                .key(key)
                .arg(amount)
                .arg(ttl_millis(ttl))
                .invoke_async(&mut conn)
                .await;
            value
        })
        .await
    }

    async fn set_if_not_exists(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> CacheResult<bool> {
        let mut conn = self.conn();
        let reply: Option<String> = self
            .bounded(async move {
                let mut cmd = redis::cmd("SET");
                cmd.arg(key).arg(value).arg("NX");
                if !ttl.is_zero() {
                    cmd.arg("PX").arg(ttl_millis(ttl));
                }
                cmd.query_async(&mut conn).await
            })
            .await?;
        Ok(reply.is_some())
    }

    async fn health(&self) -> BackendHealth {
        let started = Instant::now();
        let mut conn = self.conn();
        match self
            .bounded(async move { redis::cmd("PING").query_async::<String>(&mut conn).await })
            .await
        {
            Ok(_) => BackendHealth::healthy("redis", started.elapsed().as_secs_f64() * 1000.0),
            Err(e) => BackendHealth::unhealthy("redis", e.to_string()),
        }
    }

    async fn stats(&self) -> CacheResult<BackendStats> {
        let mut conn = self.conn();
        let info: String = self
            .bounded(async move {
                redis::cmd("INFO")
                    .arg("stats")
                    .query_async::<String>(&mut conn)
                    .await
            })
            .await?;
        let mut conn = self.conn();
        let size: usize = self
            .bounded(async move { redis::cmd("DBSIZE").query_async::<usize>(&mut conn).await })
            .await?;

        let mut stats = parse_info_stats(&info);
        stats.set_total_entries(size);
        Ok(stats)
    }
}

/// Redis PTTL reply: -2 missing, -1 no expiry, otherwise milliseconds left.
fn ttl_from_pttl(pttl: i64) -> Option<Duration> {
    if pttl < 0 {
        None
    } else {
        Some(Duration::from_millis(pttl as u64))
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

/// Extracts keyspace counters from an `INFO stats` reply.
fn parse_info_stats(info: &str) -> BackendStats {
    let mut stats = BackendStats::new("redis");
    for line in info.lines() {
        let Some((name, value)) = line.trim().split_once(':') else {
            continue;
        };
        let Ok(value) = value.trim().parse::<u64>() else {
            continue;
        };
        match name {
            "keyspace_hits" => stats.hits = value,
            "keyspace_misses" => stats.misses = value,
            "evicted_keys" => stats.evictions = value,
            "expired_keys" => stats.expirations = value,
            _ => {}
        }
    }
    stats
}
