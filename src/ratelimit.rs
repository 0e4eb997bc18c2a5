//! Fixed-window rate limiter on top of the cache.
//!
//! Each identifier gets a counter key whose TTL is the window, set in the same
//! atomic step that creates it; requests past the limit within the window are
//! throttled. Every decision
//! feeds [`RateLimitMetrics`]. A cache failure allows the request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::Cache;
use crate::error::CacheResult;
use crate::metrics::{OperationKind, RateLimitMetrics, RateScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests seen in the current window, including this one
    pub count: u64,
    pub limit: u64,
    /// Time until the window resets, set only when throttled
    pub retry_after: Option<Duration>,
}

pub struct RateLimiter {
    cache: Arc<dyn Cache>,
    metrics: Arc<RateLimitMetrics>,
    limit: u64,
    window: Duration,
}

pub fn counter_key(scope: RateScope, identifier: &str) -> String {
    format!("ratelimit:{}:{}", scope.as_str(), identifier)
}

impl RateLimiter {
    pub fn new(
        cache: Arc<dyn Cache>,
        metrics: Arc<RateLimitMetrics>,
        limit: u64,
        window: Duration,
    ) -> Self {
        Self {
            cache,
            metrics,
            limit,
            window,
        }
    }

    pub fn metrics(&self) -> &Arc<RateLimitMetrics> {
        &self.metrics
    }

    /// Counts one request from `identifier` and decides whether to allow it.
    pub async fn check(&self, scope: RateScope, identifier: &str) -> RateDecision {
        let started = Instant::now();
        let key = counter_key(scope, identifier);

        let decision = match self.count_request(&key).await {
            Ok(count) => {
                let count = u64::try_from(count).unwrap_or(0);
                let allowed = count <= self.limit;
                let retry_after = if allowed {
                    None
                } else {
                    self.cache.get_with_ttl(&key).await.and_then(|(_, ttl)| ttl)
                };
                RateDecision {
                    allowed,
                    count,
                    limit: self.limit,
                    retry_after,
                }
            }
            Err(e) => {
                warn!(key, error = %e, "rate limit check failed, allowing request");
                RateDecision {
                    allowed: true,
                    count: 0,
                    limit: self.limit,
                    retry_after: None,
                }
            }
        };

        if !decision.allowed {
            debug!(key, count = decision.count, "request throttled");
        }
        self.metrics
            .record_check(scope, identifier, decision.allowed, started.elapsed());
        decision
    }

    async fn count_request(&self, key: &str) -> CacheResult<i64> {
        self.cache.increment_with_ttl(key, 1, self.window).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn limiter(limit: u64, window: Duration) -> RateLimiter {
        RateLimiter::new(
            Arc::new(MemoryCache::new(100)),
            Arc::new(RateLimitMetrics::default()),
            limit,
            window,
        )
    }

    #[tokio::test]
    async fn test_throttles_past_limit() {
        let limiter = limiter(3, Duration::from_secs(60));
        for expected in 1..=3 {
            let decision = limiter.check(RateScope::Ip, "10.0.0.1").await;
            assert!(decision.allowed);
            assert_eq!(decision.count, expected);
        }

        let decision = limiter.check(RateScope::Ip, "10.0.0.1").await;
        assert!(!decision.allowed);
        assert!(decision.retry_after.unwrap() <= Duration::from_secs(60));

        let stats = limiter.metrics().snapshot();
        assert_eq!(stats.allowed, 3);
        assert_eq!(stats.throttled, 1);
        assert_eq!(stats.throttle_rate, 25.0);
    }

    #[tokio::test]
    async fn test_identifiers_and_scopes_are_independent() {
        let limiter = limiter(1, Duration::from_secs(60));
        assert!(limiter.check(RateScope::Ip, "a").await.allowed);
        assert!(limiter.check(RateScope::Ip, "b").await.allowed);
        assert!(limiter.check(RateScope::User, "a").await.allowed);
        assert!(!limiter.check(RateScope::Ip, "a").await.allowed);
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = limiter(1, Duration::from_millis(100));
        assert!(limiter.check(RateScope::User, "u1").await.allowed);
        assert!(!limiter.check(RateScope::User, "u1").await.allowed);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(limiter.check(RateScope::User, "u1").await.allowed);
    }

    #[tokio::test]
    async fn test_concurrent_checks_never_exceed_limit() {
        let limiter = Arc::new(limiter(10, Duration::from_secs(60)));
        let mut handles = Vec::new();
        for _ in 0..25 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.check(RateScope::Ip, "burst").await.allowed
            }));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 10);
    }

    #[tokio::test]
    async fn test_every_counter_expires() {
        let cache = MemoryCache::new(10_000);
        let limiter = RateLimiter::new(
            Arc::new(cache.clone()),
            Arc::new(RateLimitMetrics::default()),
            5,
            Duration::from_millis(1),
        );

        for i in 0..2_000 {
            let id = format!("client-{}", i % 50);
            limiter.check(RateScope::Ip, &id).await;
        }

        for i in 0..50 {
            let key = counter_key(RateScope::Ip, &format!("client-{}", i));
            if let Some((_, ttl)) = cache.get_with_ttl(&key).await {
                assert!(ttl.is_some(), "{} has no expiry", key);
            }
        }
    }
}
