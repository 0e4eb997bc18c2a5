//! Cache Store Module
//!
//! Synchronous storage engine behind [`MemoryCache`](super::MemoryCache):
//! a HashMap with LRU capacity bound and lazy plus swept TTL expiration.

use std::collections::HashMap;
use std::time::Duration;

use crate::cache::{glob_match, BackendStats, CacheEntry, LruTracker, MAX_KEY_LENGTH};
use crate::error::{CacheError, CacheResult};

// == Cache Store ==
#[derive(Debug)]
pub struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    stats: BackendStats,
    /// Maximum number of entries allowed
    max_entries: usize,
}

impl CacheStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: BackendStats::new("memory"),
            max_entries: max_entries.max(1),
        }
    }

    /// A store that never evicts. Entries leave only by TTL or delete.
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    // == Set ==
    /// Stores a value, overwriting any previous value and TTL.
    ///
    /// If the store is at capacity, the least recently used entry is evicted.
    pub fn set(&mut self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        validate_key(key)?;
        self.make_room_for(key);

        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl));
        self.lru.touch(key);
        self.stats.set_total_entries(self.entries.len());
        Ok(())
    }

    // == Set If Not Exists ==
    pub fn set_if_not_exists(
        &mut self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> CacheResult<bool> {
        validate_key(key)?;
        if self.live_entry(key).is_some() {
            return Ok(false);
        }
        self.set(key, value, ttl)?;
        Ok(true)
    }

    // == Get ==
    /// Returns the value and remaining TTL if the key is present and live.
    /// Expired entries are removed and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<(Vec<u8>, Option<Duration>)> {
        match self.live_entry(key) {
            Some(entry) => {
                let found = (entry.value.clone(), entry.ttl_remaining());
                self.stats.record_hit();
                self.lru.touch(key);
                Some(found)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Whether a live entry exists. Leaves LRU order, stats and expired
    /// entries untouched so it can run under a shared lock.
    pub fn contains_live(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    // == Delete ==
    /// Removes an entry. Returns whether a key was present.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.lru.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }

    // == Keys ==
    /// Lists live keys matching a glob pattern.
    pub fn keys(&self, pattern: &str) -> Vec<String> {
        let now = crate::cache::current_timestamp_ms();
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Increment ==
    /// Adds `amount` to an integer value, creating it with no expiry if absent.
    pub fn increment(&mut self, key: &str, amount: i64) -> CacheResult<i64> {
        self.increment_with_ttl(key, amount, Duration::ZERO)
    }

    /// Adds `amount` to an integer value. A counter created here, or one
    /// found without an expiry, gets `ttl`; a running expiry is kept.
    pub fn increment_with_ttl(&mut self, key: &str, amount: i64, ttl: Duration) -> CacheResult<i64> {
        validate_key(key)?;
        if let Some(entry) = self.live_entry_mut(key) {
            let current = parse_integer(key, &entry.value)?;
            let next = current
                .checked_add(amount)
                .ok_or_else(|| CacheError::NotNumeric(format!("{} overflows", key)))?;
            entry.replace_value(next.to_string().into_bytes());
            if entry.expires_at.is_none() {
                entry.expire_after(ttl);
            }
            self.lru.touch(key);
            return Ok(next);
        }

        self.set(key, amount.to_string().into_bytes(), ttl)?;
        Ok(amount)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.stats.set_total_entries(0);
    }

    pub fn stats(&self) -> BackendStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = crate::cache::current_timestamp_ms();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.entries.remove(key);
            self.lru.remove(key);
        }

        self.stats.record_expirations(expired_keys.len());
        self.stats.set_total_entries(self.entries.len());
        expired_keys.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry if present and live, dropping it if expired.
    fn live_entry(&mut self, key: &str) -> Option<&CacheEntry> {
        self.live_entry_mut(key).map(|entry| &*entry)
    }

    fn live_entry_mut(&mut self, key: &str) -> Option<&mut CacheEntry> {
        let expired = self.entries.get(key)?.is_expired();
        if expired {
            self.entries.remove(key);
            self.lru.remove(key);
            self.stats.record_expirations(1);
            self.stats.set_total_entries(self.entries.len());
            return None;
        }
        self.entries.get_mut(key)
    }

    fn make_room_for(&mut self, key: &str) {
        if self.entries.contains_key(key) {
            return;
        }
        while self.entries.len() >= self.max_entries {
            match self.lru.evict_oldest() {
                Some(evicted) => {
                    self.entries.remove(&evicted);
                    self.stats.record_eviction();
                }
                None => break,
            }
        }
    }
}

fn validate_key(key: &str) -> CacheResult<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

fn parse_integer(key: &str, value: &[u8]) -> CacheResult<i64> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| CacheError::NotNumeric(key.to_string()))
}
