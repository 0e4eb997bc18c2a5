//! Repository Module
//!
//! The user backing-store contract and its decorators. The store itself is
//! opaque to the caching layer: anything implementing [`UserRepository`] can
//! be wrapped by [`InstrumentedRepository`] and [`CachedUserRepository`].

mod cached;
mod instrumented;
pub mod keys;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreResult;

pub use cached::CachedUserRepository;
pub use instrumented::InstrumentedRepository;
pub use memory::InMemoryUserRepository;

// == User Entity ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            username: username.into(),
            password_hash: password_hash.into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

// == Backing Store Contract ==
/// Key-based CRUD over users.
///
/// Lookups return `Ok(None)` for a missing user. Writes targeting a missing
/// user fail with `StoreError::NotFound`; duplicate email or username fails
/// with `StoreError::Conflict`.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: User) -> StoreResult<User>;

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn get_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// One page of users ordered by creation time, plus the total count.
    async fn get_all(&self, offset: u64, limit: u64) -> StoreResult<(Vec<User>, u64)>;

    /// Replaces every mutable field of an existing user.
    async fn update(&self, user: User) -> StoreResult<User>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()>;

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<()>;

    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool>;

    async fn exists_by_username(&self, username: &str) -> StoreResult<bool>;

    async fn count(&self) -> StoreResult<u64>;
}
