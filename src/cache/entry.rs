//! Cache Entry Module
//!
//! Defines the structure for individual in-memory entries with TTL support.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// Represents a single stored value with expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored bytes
    pub value: Vec<u8>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry. A zero TTL means the entry never expires.
    pub fn new(value: Vec<u8>, ttl: Duration) -> Self {
        let now = current_timestamp_ms();
        Self {
            value,
            created_at: now,
            expires_at: expiry_from(now, ttl),
        }
    }

    /// Replaces the value while keeping the existing expiry.
    pub fn replace_value(&mut self, value: Vec<u8>) {
        self.value = value;
    }

    /// Sets the expiry to `ttl` from now. A zero TTL leaves it unchanged.
    pub fn expire_after(&mut self, ttl: Duration) {
        if let Some(expires_at) = expiry_from(current_timestamp_ms(), ttl) {
            self.expires_at = Some(expires_at);
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the entry has expired
    /// - `Some(remaining)` if the entry has TTL and hasn't expired
    /// - `None` if the entry never expires
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at.map(|expires| {
            let now = current_timestamp_ms();
            Duration::from_millis(expires.saturating_sub(now))
        })
    }
}

fn expiry_from(now_ms: u64, ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        None
    } else {
        // Sub-millisecond TTLs round up so they never mean "no expiry"
        Some(now_ms + (ttl.as_millis() as u64).max(1))
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_creation_no_ttl() {
        let entry = CacheEntry::new(b"test_value".to_vec(), Duration::ZERO);

        assert_eq!(entry.value, b"test_value");
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
        assert!(entry.ttl_remaining().is_none());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(b"v".to_vec(), Duration::from_millis(50));

        assert!(!entry.is_expired());
        sleep(Duration::from_millis(80));
        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = CacheEntry::new(b"v".to_vec(), Duration::from_secs(10));

        let remaining = entry.ttl_remaining().unwrap();
        assert!(remaining <= Duration::from_secs(10));
        assert!(remaining >= Duration::from_secs(9));
    }

    #[test]
    fn test_sub_millisecond_ttl_still_expires() {
        let entry = CacheEntry::new(b"v".to_vec(), Duration::from_micros(10));
        assert!(entry.expires_at.is_some());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = current_timestamp_ms();
        let entry = CacheEntry {
            value: b"test".to_vec(),
            created_at: now,
            expires_at: Some(now),
        };

        assert!(entry.is_expired_at(now), "Entry should be expired at boundary");
        assert!(!entry.is_expired_at(now - 1));
    }

    #[test]
    fn test_replace_value_keeps_expiry() {
        let mut entry = CacheEntry::new(b"1".to_vec(), Duration::from_secs(30));
        let expires = entry.expires_at;
        entry.replace_value(b"2".to_vec());
        assert_eq!(entry.value, b"2");
        assert_eq!(entry.expires_at, expires);
    }
}
