//! Rate-limiter decision metrics and effectiveness scoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;

use super::record::{percentage, AggregateStats, OperationKind, OperationRecord, WindowStats};
use super::violations::{Hotspot, ViolationTracker, DEFAULT_TRACKER_CAPACITY, VIOLATION_RETENTION};
use super::{Aggregator, AggregatorConfig};

/// Minimum requests before an IP can be reported as a hotspot.
pub const IP_HOTSPOT_MIN_REQUESTS: u64 = 10;

/// Minimum requests before a user can be reported as a hotspot.
pub const USER_HOTSPOT_MIN_REQUESTS: u64 = 5;

/// Violation rate (percent) a hotspot must exceed.
pub const HOTSPOT_MIN_VIOLATION_RATE: f64 = 5.0;

pub const TOP_VIOLATORS: usize = 10;

/// What a rate-limit check was keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateScope {
    Ip,
    User,
}

impl OperationKind for RateScope {
    const ALL: &'static [Self] = &[RateScope::Ip, RateScope::User];

    fn index(self) -> usize {
        self as usize
    }

    fn as_str(self) -> &'static str {
        match self {
            RateScope::Ip => "ip",
            RateScope::User => "user",
        }
    }
}

/// Effectiveness of throttling given the percentage of rejected requests.
///
/// Piecewise linear and monotonically decreasing: light throttling scores
/// near 100, heavy throttling near 0.
pub fn effectiveness_score(throttle_rate: f64) -> f64 {
    let r = throttle_rate;
    if r <= 1.0 {
        100.0
    } else if r <= 10.0 {
        100.0 - (r - 1.0) * 10.0 / 9.0
    } else if r <= 25.0 {
        90.0 - (r - 10.0) * 40.0 / 15.0
    } else {
        (50.0 - (r - 25.0)).max(0.0)
    }
}

#[derive(Debug)]
pub struct RateLimitMetrics {
    checks: Aggregator<RateScope>,
    allowed: AtomicU64,
    throttled: AtomicU64,
    by_ip: Mutex<ViolationTracker>,
    by_user: Mutex<ViolationTracker>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatsSnapshot {
    pub total_checks: u64,
    pub allowed: u64,
    pub throttled: u64,
    pub throttle_rate: f64,
    pub effectiveness_score: f64,
    pub top_ip_violators: Vec<Hotspot>,
    pub top_user_violators: Vec<Hotspot>,
    pub recent_violations: Vec<OperationRecord<RateScope>>,
    pub operations: AggregateStats<RateScope>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitWindowStats {
    #[serde(flatten)]
    pub window: WindowStats,
    pub throttled: u64,
    pub throttle_rate: f64,
    pub effectiveness_score: f64,
}

impl RateLimitMetrics {
    pub fn new(config: AggregatorConfig) -> Self {
        Self::with_tracker_capacity(config, DEFAULT_TRACKER_CAPACITY)
    }

    pub fn with_tracker_capacity(config: AggregatorConfig, capacity: usize) -> Self {
        Self {
            checks: Aggregator::new(config),
            allowed: AtomicU64::new(0),
            throttled: AtomicU64::new(0),
            by_ip: Mutex::new(ViolationTracker::new(capacity, VIOLATION_RETENTION)),
            by_user: Mutex::new(ViolationTracker::new(capacity, VIOLATION_RETENTION)),
        }
    }

    /// Records one limiter decision. A rejected request is logged as a
    /// violation event.
    pub fn record_check(&self, scope: RateScope, identifier: &str, allowed: bool, duration: Duration) {
        if allowed {
            self.allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.throttled.fetch_add(1, Ordering::Relaxed);
        }
        self.checks
            .record_with(scope, identifier, duration, true, !allowed);

        let now = Utc::now();
        self.tracker(scope).lock().record(identifier, !allowed, now);
    }

    pub fn throttle_rate(&self) -> f64 {
        let allowed = self.allowed.load(Ordering::Relaxed);
        let throttled = self.throttled.load(Ordering::Relaxed);
        percentage(throttled, allowed + throttled)
    }

    pub fn top_violators(&self, scope: RateScope) -> Vec<Hotspot> {
        let min_requests = match scope {
            RateScope::Ip => IP_HOTSPOT_MIN_REQUESTS,
            RateScope::User => USER_HOTSPOT_MIN_REQUESTS,
        };
        self.tracker(scope)
            .lock()
            .hotspots(min_requests, HOTSPOT_MIN_VIOLATION_RATE, TOP_VIOLATORS)
    }

    pub fn snapshot(&self) -> RateLimitStatsSnapshot {
        let allowed = self.allowed.load(Ordering::Relaxed);
        let throttled = self.throttled.load(Ordering::Relaxed);
        let throttle_rate = percentage(throttled, allowed + throttled);
        let operations = self.checks.snapshot();

        RateLimitStatsSnapshot {
            total_checks: allowed + throttled,
            allowed,
            throttled,
            throttle_rate,
            effectiveness_score: effectiveness_score(throttle_rate),
            top_ip_violators: self.top_violators(RateScope::Ip),
            top_user_violators: self.top_violators(RateScope::User),
            recent_violations: operations.notable_events.clone(),
            operations,
        }
    }

    /// Throttling statistics over the last `window` of history.
    pub fn windowed(&self, window: Duration) -> RateLimitWindowStats {
        let stats = self.checks.windowed(window);
        let throttled = self
            .checks
            .history_within(window)
            .iter()
            .filter(|r| r.notable)
            .count() as u64;
        let throttle_rate = percentage(throttled, stats.count);

        RateLimitWindowStats {
            window: stats,
            throttled,
            throttle_rate,
            effectiveness_score: effectiveness_score(throttle_rate),
        }
    }

    /// Drops identifiers idle past the retention window.
    pub fn purge_stale(&self) -> usize {
        let now = Utc::now();
        self.by_ip.lock().purge_stale(now) + self.by_user.lock().purge_stale(now)
    }

    pub fn reset(&self) {
        self.checks.reset();
        self.allowed.store(0, Ordering::Relaxed);
        self.throttled.store(0, Ordering::Relaxed);
        self.by_ip.lock().clear();
        self.by_user.lock().clear();
    }

    fn tracker(&self, scope: RateScope) -> &Mutex<ViolationTracker> {
        match scope {
            RateScope::Ip => &self.by_ip,
            RateScope::User => &self.by_user,
        }
    }
}

impl Default for RateLimitMetrics {
    fn default() -> Self {
        Self::new(AggregatorConfig::default())
    }
}
