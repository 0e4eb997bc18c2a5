//! Query metrics decorator for any [`UserRepository`].

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use uuid::Uuid;

use super::{User, UserRepository};
use crate::error::StoreResult;
use crate::metrics::{QueryKind, QueryMetrics};

/// Times every backing-store call and records it into [`QueryMetrics`].
/// Calls exceeding the slow threshold are logged by the metrics instance.
#[derive(Clone)]
pub struct InstrumentedRepository<R> {
    inner: R,
    metrics: Arc<QueryMetrics>,
}

impl<R: UserRepository> InstrumentedRepository<R> {
    pub fn new(inner: R, metrics: Arc<QueryMetrics>) -> Self {
        Self { inner, metrics }
    }

    pub fn metrics(&self) -> &Arc<QueryMetrics> {
        &self.metrics
    }

    async fn timed<T, F>(&self, kind: QueryKind, query: &str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>> + Send,
    {
        let started = Instant::now();
        let result = fut.await;
        self.metrics
            .record_query(kind, query, started.elapsed(), result.is_ok());
        result
    }
}

#[async_trait]
impl<R: UserRepository> UserRepository for InstrumentedRepository<R> {
    async fn create(&self, user: User) -> StoreResult<User> {
        self.timed(QueryKind::Insert, "users.create", self.inner.create(user))
            .await
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.timed(QueryKind::Select, "users.get_by_id", self.inner.get_by_id(id))
            .await
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.timed(
            QueryKind::Select,
            "users.get_by_email",
            self.inner.get_by_email(email),
        )
        .await
    }

    async fn get_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.timed(
            QueryKind::Select,
            "users.get_by_username",
            self.inner.get_by_username(username),
        )
        .await
    }

    async fn get_all(&self, offset: u64, limit: u64) -> StoreResult<(Vec<User>, u64)> {
        self.timed(
            QueryKind::Select,
            "users.get_all",
            self.inner.get_all(offset, limit),
        )
        .await
    }

    async fn update(&self, user: User) -> StoreResult<User> {
        self.timed(QueryKind::Update, "users.update", self.inner.update(user))
            .await
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        self.timed(
            QueryKind::Update,
            "users.update_password",
            self.inner.update_password(id, password_hash),
        )
        .await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<()> {
        self.timed(
            QueryKind::Update,
            "users.set_active",
            self.inner.set_active(id, active),
        )
        .await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.timed(QueryKind::Delete, "users.delete", self.inner.delete(id))
            .await
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        self.timed(
            QueryKind::Exists,
            "users.exists_by_email",
            self.inner.exists_by_email(email),
        )
        .await
    }

    async fn exists_by_username(&self, username: &str) -> StoreResult<bool> {
        self.timed(
            QueryKind::Exists,
            "users.exists_by_username",
            self.inner.exists_by_username(username),
        )
        .await
    }

    async fn count(&self) -> StoreResult<u64> {
        self.timed(QueryKind::Count, "users.count", self.inner.count())
            .await
    }
}
