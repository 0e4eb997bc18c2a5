//! Per-identifier rate-limit violation tracking.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::record::percentage;

/// How long an identifier is remembered after its last activity.
pub const VIOLATION_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Violation timestamps kept per identifier.
pub const MAX_VIOLATION_TIMESTAMPS: usize = 50;

pub const DEFAULT_TRACKER_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct ViolationEntry {
    requests: u64,
    violations: u64,
    first_violation: Option<DateTime<Utc>>,
    last_violation: Option<DateTime<Utc>>,
    last_seen: DateTime<Utc>,
    recent: VecDeque<DateTime<Utc>>,
}

impl ViolationEntry {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            requests: 0,
            violations: 0,
            first_violation: None,
            last_violation: None,
            last_seen: now,
            recent: VecDeque::new(),
        }
    }
}

/// An identifier whose violation rate stands out from its traffic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hotspot {
    pub identifier: String,
    pub requests: u64,
    pub violations: u64,
    pub violation_rate: f64,
    pub first_violation: Option<DateTime<Utc>>,
    pub last_violation: Option<DateTime<Utc>>,
    pub recent_violations: Vec<DateTime<Utc>>,
}

/// Bounded map of identifier -> traffic and violation history.
///
/// Entries idle longer than the retention window are purged; when the map
/// exceeds capacity the least-recently-violating entries are evicted.
#[derive(Debug)]
pub struct ViolationTracker {
    entries: HashMap<String, ViolationEntry>,
    capacity: usize,
    retention: Duration,
}

impl ViolationTracker {
    pub fn new(capacity: usize, retention: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            retention,
        }
    }

    pub fn record(&mut self, identifier: &str, violated: bool, now: DateTime<Utc>) {
        let entry = self
            .entries
            .entry(identifier.to_string())
            .or_insert_with(|| ViolationEntry::new(now));

        entry.requests += 1;
        entry.last_seen = now;
        if violated {
            entry.violations += 1;
            entry.first_violation.get_or_insert(now);
            entry.last_violation = Some(now);
            if entry.recent.len() >= MAX_VIOLATION_TIMESTAMPS {
                entry.recent.pop_front();
            }
            entry.recent.push_back(now);
        }

        if self.entries.len() > self.capacity {
            self.evict_least_recent_violators();
        }
    }

    /// Drops identifiers idle past the retention window and trims old
    /// violation timestamps. Returns the number of identifiers removed.
    pub fn purge_stale(&mut self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(self.retention)
            .ok()
            .and_then(|r| now.checked_sub_signed(r))
        else {
            return 0;
        };

        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.last_seen >= cutoff);
        for entry in self.entries.values_mut() {
            while entry.recent.front().is_some_and(|t| *t < cutoff) {
                entry.recent.pop_front();
            }
        }
        before - self.entries.len()
    }

    /// Identifiers with at least `min_requests` requests and a violation rate
    /// above `min_rate` percent, ranked by violation count, capped to `limit`.
    pub fn hotspots(&self, min_requests: u64, min_rate: f64, limit: usize) -> Vec<Hotspot> {
        let mut hotspots: Vec<Hotspot> = self
            .entries
            .iter()
            .filter(|(_, e)| e.requests >= min_requests && e.violations > 0)
            .map(|(id, e)| Hotspot {
                identifier: id.clone(),
                requests: e.requests,
                violations: e.violations,
                violation_rate: percentage(e.violations, e.requests),
                first_violation: e.first_violation,
                last_violation: e.last_violation,
                recent_violations: e.recent.iter().copied().collect(),
            })
            .filter(|h| h.violation_rate > min_rate)
            .collect();

        hotspots.sort_by(|a, b| {
            b.violations
                .cmp(&a.violations)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        hotspots.truncate(limit);
        hotspots
    }

    pub fn violations_of(&self, identifier: &str) -> u64 {
        self.entries.get(identifier).map(|e| e.violations).unwrap_or(0)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict_least_recent_violators(&mut self) {
        // Evict down to 90% of capacity so eviction is not rerun on every insert
        let target = self.capacity - self.capacity / 10;
        let excess = self.entries.len().saturating_sub(target);
        if excess == 0 {
            return;
        }

        let mut ranked: Vec<(Option<DateTime<Utc>>, DateTime<Utc>, String)> = self
            .entries
            .iter()
            .map(|(id, e)| (e.last_violation, e.last_seen, id.clone()))
            .collect();
        // None (never violated) sorts before any timestamp
        ranked.sort();

        for (_, _, id) in ranked.into_iter().take(excess) {
            self.entries.remove(&id);
        }
    }
}

impl Default for ViolationTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TRACKER_CAPACITY, VIOLATION_RETENTION)
    }
}
