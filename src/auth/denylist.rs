//! Revoked-token denylist stored in the cache.
//!
//! An entry lives exactly as long as the token it revokes would have stayed
//! valid, so the denylist never outgrows the set of live tokens.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::jwt::unverified_expiry;
use super::validator::DenylistChecker;
use crate::cache::Cache;
use crate::error::{DenylistError, TokenError};

const KEY_PREFIX: &str = "denylist:";
const SENTINEL: &[u8] = b"1";

/// Cache key for a token: a hex SHA-256 of the raw token string.
pub fn denylist_key(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{}{}", KEY_PREFIX, hex::encode(digest))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// Stored with the token's remaining lifetime
    Revoked { ttl: Duration },
    /// Token had already expired; nothing stored
    AlreadyExpired,
}

/// Result of [`TokenDenylist::revoke_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRevocation {
    pub revoked: usize,
    /// Unparseable or already expired tokens
    pub skipped: usize,
    /// TTL shared by every stored entry
    pub ttl: Option<Duration>,
}

#[derive(Clone)]
pub struct TokenDenylist {
    cache: Arc<dyn Cache>,
}

fn malformed(err: TokenError) -> DenylistError {
    DenylistError::MalformedToken(err.to_string())
}

/// Remaining lifetime at `now`, or `None` once expired.
fn remaining_life(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    let millis = (expires_at - now).num_milliseconds();
    (millis > 0).then(|| Duration::from_millis(millis as u64))
}

impl TokenDenylist {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    /// Denylists a token until its own expiry.
    ///
    /// A token that cannot be decoded fails with `MalformedToken` and is not
    /// stored; [`Self::is_revoked`] already reports it as revoked.
    pub async fn revoke(&self, token: &str) -> Result<RevokeOutcome, DenylistError> {
        let expires_at = unverified_expiry(token).map_err(malformed)?;
        let Some(ttl) = remaining_life(expires_at, Utc::now()) else {
            debug!("token already expired, not denylisting");
            return Ok(RevokeOutcome::AlreadyExpired);
        };

        self.cache
            .set(&denylist_key(token), SENTINEL.to_vec(), ttl)
            .await?;
        info!(ttl_ms = ttl.as_millis() as u64, "token revoked");
        Ok(RevokeOutcome::Revoked { ttl })
    }

    /// Denylists many tokens under one TTL, the shortest remaining lifetime
    /// among them. Tokens with longer lives are protected only that long.
    pub async fn revoke_batch(&self, tokens: &[&str]) -> Result<BatchRevocation, DenylistError> {
        let now = Utc::now();
        let mut live = Vec::with_capacity(tokens.len());
        let mut shortest: Option<Duration> = None;

        for token in tokens {
            let life = unverified_expiry(token)
                .ok()
                .and_then(|expires_at| remaining_life(expires_at, now));
            if let Some(life) = life {
                shortest = Some(shortest.map_or(life, |s| s.min(life)));
                live.push(denylist_key(token));
            }
        }

        let skipped = tokens.len() - live.len();
        let Some(ttl) = shortest else {
            return Ok(BatchRevocation {
                skipped,
                ..BatchRevocation::default()
            });
        };

        let revoked = live.len();
        let items = live
            .into_iter()
            .map(|key| (key, SENTINEL.to_vec()))
            .collect();
        self.cache.set_multiple(items, ttl).await?;
        info!(revoked, skipped, ttl_ms = ttl.as_millis() as u64, "token batch revoked");

        Ok(BatchRevocation {
            revoked,
            skipped,
            ttl: Some(ttl),
        })
    }

    /// Whether a token must be refused.
    ///
    /// Unparseable tokens are always revoked; expired tokens never are (expiry
    /// validation rejects them). Backend failures are surfaced so the caller
    /// can apply its fail mode.
    pub async fn is_revoked(&self, token: &str) -> Result<bool, DenylistError> {
        let expires_at = match unverified_expiry(token) {
            Ok(expires_at) => expires_at,
            Err(_) => return Ok(true),
        };
        if remaining_life(expires_at, Utc::now()).is_none() {
            return Ok(false);
        }
        Ok(self.cache.exists(&denylist_key(token)).await?)
    }

    /// Lifts a revocation.
    pub async fn unrevoke(&self, token: &str) -> Result<(), DenylistError> {
        unverified_expiry(token).map_err(malformed)?;
        self.cache.delete(&denylist_key(token)).await?;
        info!("token revocation lifted");
        Ok(())
    }

    /// Remaining lifetime of a token's denylist entry, `None` if not listed.
    pub async fn remaining_ttl(&self, token: &str) -> Result<Option<Duration>, DenylistError> {
        let entry = self.cache.try_get_with_ttl(&denylist_key(token)).await?;
        Ok(entry.and_then(|(_, ttl)| ttl))
    }
}

#[async_trait]
impl DenylistChecker for TokenDenylist {
    async fn is_revoked(&self, token: &str) -> Result<bool, DenylistError> {
        TokenDenylist::is_revoked(self, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtService;
    use crate::cache::MemoryCache;

    fn setup() -> (TokenDenylist, MemoryCache, JwtService) {
        let cache = MemoryCache::new(100);
        let denylist = TokenDenylist::new(Arc::new(cache.clone()));
        (denylist, cache, JwtService::new("secret"))
    }

    fn token_expiring_in(jwt: &JwtService, life: chrono::Duration) -> String {
        jwt.issue_until("user-1", Utc::now() + life).unwrap()
    }

    #[test]
    fn test_key_is_hashed_and_stable() {
        let key = denylist_key("abc");
        assert_eq!(key, denylist_key("abc"));
        assert_ne!(key, denylist_key("abd"));
        assert!(key.starts_with("denylist:"));
        assert_eq!(key.len(), "denylist:".len() + 64);
    }

    #[tokio::test]
    async fn test_revoke_ttl_bounded_by_token_life() {
        let (denylist, _cache, jwt) = setup();
        let token = token_expiring_in(&jwt, chrono::Duration::hours(1));

        let RevokeOutcome::Revoked { ttl } = denylist.revoke(&token).await.unwrap() else {
            panic!("expected token to be stored");
        };
        assert!(ttl <= Duration::from_secs(3600));
        assert!(ttl > Duration::from_secs(3590));

        let stored = denylist.remaining_ttl(&token).await.unwrap().unwrap();
        assert!(stored <= ttl);
        assert!(denylist.is_revoked(&token).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoking_expired_token_stores_nothing() {
        let (denylist, cache, jwt) = setup();
        let token = token_expiring_in(&jwt, chrono::Duration::seconds(-30));

        assert_eq!(denylist.revoke(&token).await.unwrap(), RevokeOutcome::AlreadyExpired);
        assert!(cache.is_empty().await);
        assert!(!denylist.is_revoked(&token).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_token() {
        let (denylist, cache, _jwt) = setup();

        let result = denylist.revoke("garbage").await;
        assert!(matches!(result, Err(DenylistError::MalformedToken(_))));
        assert!(cache.is_empty().await);
        // Still refused
        assert!(denylist.is_revoked("garbage").await.unwrap());
    }

    #[tokio::test]
    async fn test_unrevoke() {
        let (denylist, _cache, jwt) = setup();
        let token = token_expiring_in(&jwt, chrono::Duration::minutes(5));
        denylist.revoke(&token).await.unwrap();

        denylist.unrevoke(&token).await.unwrap();
        assert!(!denylist.is_revoked(&token).await.unwrap());
        assert_eq!(denylist.remaining_ttl(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_batch_shares_minimum_ttl() {
        let (denylist, _cache, jwt) = setup();
        let short = token_expiring_in(&jwt, chrono::Duration::minutes(10));
        let medium = token_expiring_in(&jwt, chrono::Duration::hours(1));
        let long = token_expiring_in(&jwt, chrono::Duration::hours(2));

        let result = denylist
            .revoke_batch(&[short.as_str(), medium.as_str(), long.as_str()])
            .await
            .unwrap();
        assert_eq!(result.revoked, 3);
        assert_eq!(result.skipped, 0);

        let ttl = result.ttl.unwrap();
        assert!(ttl <= Duration::from_secs(600));
        assert!(ttl > Duration::from_secs(590));

        for token in [&short, &medium, &long] {
            assert!(denylist.is_revoked(token).await.unwrap());
            // The long-lived token is only covered for the shared TTL
            let remaining = denylist.remaining_ttl(token).await.unwrap().unwrap();
            assert!(remaining <= Duration::from_secs(600));
        }
    }

    #[tokio::test]
    async fn test_batch_skips_unusable_tokens() {
        let (denylist, cache, jwt) = setup();
        let expired = token_expiring_in(&jwt, chrono::Duration::minutes(-1));

        let result = denylist.revoke_batch(&["garbage", expired.as_str()]).await.unwrap();
        assert_eq!(result, BatchRevocation { revoked: 0, skipped: 2, ttl: None });
        assert!(cache.is_empty().await);
    }
}
