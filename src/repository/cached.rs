//! Cache-aside decorator for a [`UserRepository`].
//!
//! Reads go cache first and populate on a miss. Writes hit the store first
//! and, only once it succeeds, invalidate every key derived from the users
//! involved plus all listing and count keys.
//!
//! Cache failures never fail an operation: reads fall through to the store
//! and invalidation errors are logged. A write epoch guards populates so a
//! reader that loaded a value before a concurrent write cannot leave it in
//! the cache after that write's invalidation has run. Writes to the same
//! user are serialized, so each one invalidates the keys of the state the
//! previous write left behind.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{keys, User, UserRepository};
use crate::cache::{Cache, CacheExt};
use crate::error::StoreResult;

/// Default TTL of populated entries.
pub const DEFAULT_REPOSITORY_TTL: Duration = Duration::from_secs(300);

/// Lock stripes for per-user write serialization.
const WRITE_STRIPES: usize = 64;

pub struct CachedUserRepository<R> {
    inner: R,
    cache: Arc<dyn Cache>,
    ttl: Duration,
    write_epoch: AtomicU64,
    write_locks: Vec<Mutex<()>>,
}

impl<R: UserRepository> CachedUserRepository<R> {
    pub fn new(inner: R, cache: Arc<dyn Cache>) -> Self {
        Self::with_ttl(inner, cache, DEFAULT_REPOSITORY_TTL)
    }

    pub fn with_ttl(inner: R, cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self {
            inner,
            cache,
            ttl,
            write_epoch: AtomicU64::new(0),
            write_locks: (0..WRITE_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    // == Read Path ==
    async fn read_through<T, F>(&self, key: &str, load: F) -> StoreResult<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: Future<Output = StoreResult<T>> + Send,
    {
        let epoch = self.write_epoch.load(Ordering::Acquire);
        if let Some(cached) = self.cache.get_json::<T>(key).await {
            debug!(key, "repository cache hit");
            return Ok(cached);
        }

        let value = load.await?;
        self.populate(key, &value, epoch).await;
        Ok(value)
    }

    /// Like [`Self::read_through`] but never caches an absent user.
    async fn read_through_optional<F>(&self, key: &str, load: F) -> StoreResult<Option<User>>
    where
        F: Future<Output = StoreResult<Option<User>>> + Send,
    {
        let epoch = self.write_epoch.load(Ordering::Acquire);
        if let Some(cached) = self.cache.get_json::<User>(key).await {
            debug!(key, "repository cache hit");
            return Ok(Some(cached));
        }

        let user = load.await?;
        if let Some(user) = &user {
            self.populate(key, user, epoch).await;
        }
        Ok(user)
    }

    async fn populate<T>(&self, key: &str, value: &T, epoch: u64)
    where
        T: Serialize + Sync + ?Sized,
    {
        if self.write_epoch.load(Ordering::Acquire) != epoch {
            debug!(key, "write raced the load, skipping populate");
            return;
        }
        if let Err(e) = self.cache.set_json(key, value, self.ttl).await {
            warn!(key, error = %e, "failed to populate repository cache");
            return;
        }
        // A write that finished invalidating before our set landed would
        // otherwise leave the stale value behind
        if self.write_epoch.load(Ordering::Acquire) != epoch {
            debug!(key, "write raced the populate, retracting");
            if let Err(e) = self.cache.delete(key).await {
                warn!(key, error = %e, "failed to retract raced populate");
            }
        }
    }

    // == Write Path ==
    /// Invalidates every key derived from `users` plus all listing and count
    /// keys. Must be called after the store write succeeded.
    async fn invalidate(&self, users: &[&User]) {
        self.write_epoch.fetch_add(1, Ordering::AcqRel);

        let mut stale: Vec<String> = users.iter().flat_map(|u| keys::entity_keys(u)).collect();
        match self.cache.keys(keys::LISTING_PATTERN).await {
            Ok(listing) => stale.extend(listing),
            Err(e) => warn!(pattern = keys::LISTING_PATTERN, error = %e, "failed to list cached pages"),
        }
        stale.push(keys::COUNT_KEY.to_string());
        stale.sort();
        stale.dedup();

        match self.cache.delete_multiple(&stale).await {
            Ok(()) => debug!(keys = stale.len(), "invalidated repository cache"),
            Err(e) => warn!(keys = stale.len(), error = %e, "repository cache invalidation failed"),
        }
    }

    /// Held across load-previous, write and invalidate of one user.
    fn write_lock(&self, id: Uuid) -> &Mutex<()> {
        &self.write_locks[(id.as_u128() % WRITE_STRIPES as u128) as usize]
    }

    /// Current state of a user straight from the store, for invalidating
    /// the values a write is about to replace.
    async fn load_previous(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.inner.get_by_id(id).await
    }
}

#[async_trait]
impl<R: UserRepository> UserRepository for CachedUserRepository<R> {
    async fn create(&self, user: User) -> StoreResult<User> {
        let created = self.inner.create(user).await?;
        self.invalidate(&[&created]).await;
        Ok(created)
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.read_through_optional(&keys::by_id(id), self.inner.get_by_id(id))
            .await
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.read_through_optional(&keys::by_email(email), self.inner.get_by_email(email))
            .await
    }

    async fn get_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.read_through_optional(
            &keys::by_username(username),
            self.inner.get_by_username(username),
        )
        .await
    }

    async fn get_all(&self, offset: u64, limit: u64) -> StoreResult<(Vec<User>, u64)> {
        self.read_through(&keys::by_page(offset, limit), self.inner.get_all(offset, limit))
            .await
    }

    async fn update(&self, user: User) -> StoreResult<User> {
        let _guard = self.write_lock(user.id).lock().await;
        let previous = self.load_previous(user.id).await?;
        let updated = self.inner.update(user).await?;
        match &previous {
            Some(previous) => self.invalidate(&[previous, &updated]).await,
            None => self.invalidate(&[&updated]).await,
        }
        Ok(updated)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        let _guard = self.write_lock(id).lock().await;
        let previous = self.load_previous(id).await?;
        self.inner.update_password(id, password_hash).await?;
        if let Some(previous) = &previous {
            self.invalidate(&[previous]).await;
        }
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<()> {
        let _guard = self.write_lock(id).lock().await;
        let previous = self.load_previous(id).await?;
        self.inner.set_active(id, active).await?;
        if let Some(previous) = &previous {
            self.invalidate(&[previous]).await;
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let _guard = self.write_lock(id).lock().await;
        let previous = self.load_previous(id).await?;
        self.inner.delete(id).await?;
        match &previous {
            Some(previous) => self.invalidate(&[previous]).await,
            None => {
                self.write_epoch.fetch_add(1, Ordering::AcqRel);
                if let Err(e) = self.cache.delete(&keys::by_id(id)).await {
                    warn!(%id, error = %e, "repository cache invalidation failed");
                }
            }
        }
        Ok(())
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        self.read_through(&keys::exists_email(email), self.inner.exists_by_email(email))
            .await
    }

    async fn exists_by_username(&self, username: &str) -> StoreResult<bool> {
        self.read_through(
            &keys::exists_username(username),
            self.inner.exists_by_username(username),
        )
        .await
    }

    async fn count(&self) -> StoreResult<u64> {
        self.read_through(keys::COUNT_KEY, self.inner.count()).await
    }
}
