//! In-memory user store.
//!
//! Reference implementation of [`UserRepository`] used by tests and the demo
//! binary. Availability can be toggled to exercise store-failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{User, UserRepository};
use crate::error::{StoreError, StoreResult};

#[derive(Clone, Debug, Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `StoreError::Unavailable`
    /// until re-enabled.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("user store offline".to_string()));
        }
        Ok(())
    }
}

fn check_unique(users: &HashMap<Uuid, User>, candidate: &User) -> StoreResult<()> {
    for user in users.values().filter(|u| u.id != candidate.id) {
        if user.email == candidate.email {
            return Err(StoreError::Conflict(format!("email {}", candidate.email)));
        }
        if user.username == candidate.username {
            return Err(StoreError::Conflict(format!("username {}", candidate.username)));
        }
    }
    Ok(())
}

fn not_found(id: Uuid) -> StoreError {
    StoreError::NotFound(format!("user {}", id))
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> StoreResult<User> {
        self.check_available()?;
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("id {}", user.id)));
        }
        check_unique(&users, &user)?;
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.check_available()?;
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.check_available()?;
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn get_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.check_available()?;
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn get_all(&self, offset: u64, limit: u64) -> StoreResult<(Vec<User>, u64)> {
        self.check_available()?;
        let users = self.users.read().await;
        let mut all: Vec<&User> = users.values().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let page = all
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok((page, users.len() as u64))
    }

    async fn update(&self, mut user: User) -> StoreResult<User> {
        self.check_available()?;
        let mut users = self.users.write().await;
        let existing = users.get(&user.id).ok_or_else(|| not_found(user.id))?;
        check_unique(&users, &user)?;

        user.created_at = existing.created_at;
        user.updated_at = Utc::now();
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        self.check_available()?;
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or_else(|| not_found(id))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<()> {
        self.check_available()?;
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or_else(|| not_found(id))?;
        user.is_active = active;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.check_available()?;
        self.users
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        Ok(self.get_by_email(email).await?.is_some())
    }

    async fn exists_by_username(&self, username: &str) -> StoreResult<bool> {
        Ok(self.get_by_username(username).await?.is_some())
    }

    async fn count(&self) -> StoreResult<u64> {
        self.check_available()?;
        Ok(self.users.read().await.len() as u64)
    }
}
