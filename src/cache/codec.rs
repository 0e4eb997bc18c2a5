//! Transparent value encoding on top of the byte-level [`Cache`] contract.
//!
//! Structured values are stored as JSON; strings pass through as raw UTF-8.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use super::Cache;
use crate::error::CacheResult;

/// Typed accessors available on every [`Cache`].
#[async_trait]
pub trait CacheExt: Cache {
    /// Reads and decodes a JSON value. Undecodable bytes count as a miss.
    async fn get_json<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned + Send,
    {
        let bytes = self.get(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "cached value failed to decode, treating as miss");
                None
            }
        }
    }

    async fn set_json<T>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, bytes, ttl).await
    }

    async fn get_string(&self, key: &str) -> Option<String> {
        let bytes = self.get(key).await?;
        String::from_utf8(bytes).ok()
    }

    async fn set_string(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.set(key, value.as_bytes().to_vec(), ttl).await
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, NO_EXPIRY};
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        age: u32,
    }

    #[tokio::test]
    async fn test_json_roundtrip() {
        let cache = MemoryCache::new(100);
        let profile = Profile {
            name: "ada".to_string(),
            age: 36,
        };

        cache.set_json("profile:1", &profile, NO_EXPIRY).await.unwrap();
        let loaded: Option<Profile> = cache.get_json("profile:1").await;
        assert_eq!(loaded, Some(profile));
    }

    #[tokio::test]
    async fn test_strings_are_stored_unencoded() {
        let cache = MemoryCache::new(100);
        cache.set_string("greeting", "hello", NO_EXPIRY).await.unwrap();

        assert_eq!(cache.get("greeting").await, Some(b"hello".to_vec()));
        assert_eq!(cache.get_string("greeting").await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn test_undecodable_value_is_a_miss() {
        let cache = MemoryCache::new(100);
        cache.set("profile:2", b"not json".to_vec(), NO_EXPIRY).await.unwrap();

        let loaded: Option<Profile> = cache.get_json("profile:2").await;
        assert!(loaded.is_none());
    }
}
