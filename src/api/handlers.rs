//! API Handlers
//!
//! Health and statistics exposition over the composed caching layer.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::info;

use super::middleware::bearer_token;
use crate::auth::{GuardedValidator, JwtService, TokenDenylist};
use crate::cache::{Cache, InstrumentedCache};
use crate::config::Config;
use crate::error::ApiError;
use crate::metrics::{CacheMetrics, QueryMetrics, RateLimitMetrics};
use crate::models::{
    CacheStatsResponse, HealthResponse, QueryStatsResponse, RateLimitStatsResponse,
    ResetResponse, StoreHealth, WindowQuery,
};
use crate::ratelimit::RateLimiter;
use crate::repository::{CachedUserRepository, InstrumentedRepository, UserRepository};

/// Application state shared across all handlers.
///
/// Holds the composed layer: every component shares one instrumented cache
/// and reports into its own metrics instance.
#[derive(Clone)]
pub struct AppState {
    /// Instrumented cache shared by every component
    pub cache: Arc<dyn Cache>,
    /// Cache-aside user repository
    pub users: Arc<dyn UserRepository>,
    /// Instrumented store without caching, used for health checks
    pub store: Arc<dyn UserRepository>,
    pub cache_metrics: Arc<CacheMetrics>,
    pub query_metrics: Arc<QueryMetrics>,
    /// Also owns the rate-limit metrics
    pub limiter: Arc<RateLimiter>,
    /// Revocations, kept apart from the evicting shared cache
    pub denylist: Arc<TokenDenylist>,
    pub validator: Arc<GuardedValidator>,
    /// Whether the rate-limit middleware keys on `X-Forwarded-For`
    pub trust_forwarded_for: bool,
}

impl AppState {
    /// Composes the layer over a cache backend, a denylist backend and a
    /// user store.
    ///
    /// The denylist backend must not evict live entries: an evicted
    /// revocation would let the token validate again. Pass a
    /// [`MemoryCache::unbounded`](crate::cache::MemoryCache::unbounded) or
    /// the Redis backend, never the capacity-bound shared memory cache.
    pub fn from_config<C, D, R>(config: &Config, backend: C, denylist_backend: D, store: R) -> Self
    where
        C: Cache + 'static,
        D: Cache + 'static,
        R: UserRepository + Clone + 'static,
    {
        let cache_metrics = Arc::new(CacheMetrics::new(
            config.metrics_config(config.slow_cache_op_ms),
        ));
        let query_metrics = Arc::new(QueryMetrics::new(
            config.metrics_config(config.slow_query_ms),
        ));
        let rate_limit_metrics = Arc::new(RateLimitMetrics::new(
            config.metrics_config(config.slow_cache_op_ms),
        ));

        let cache: Arc<dyn Cache> =
            Arc::new(InstrumentedCache::new(backend, cache_metrics.clone()));
        let store = InstrumentedRepository::new(store, query_metrics.clone());
        let unwrapped: Arc<dyn UserRepository> = Arc::new(store.clone());
        let users: Arc<dyn UserRepository> = Arc::new(CachedUserRepository::with_ttl(
            store,
            cache.clone(),
            config.repository_cache_ttl(),
        ));

        let denylist_cache: Arc<dyn Cache> = Arc::new(InstrumentedCache::new(
            denylist_backend,
            cache_metrics.clone(),
        ));
        let denylist = Arc::new(TokenDenylist::new(denylist_cache));
        let validator = GuardedValidator::new(
            JwtService::new(&config.jwt_secret),
            denylist.clone(),
            config.denylist_fail_mode,
        );
        let limiter = RateLimiter::new(
            cache.clone(),
            rate_limit_metrics,
            config.rate_limit_requests,
            config.rate_limit_window(),
        );

        Self {
            cache,
            users,
            store: unwrapped,
            cache_metrics,
            query_metrics,
            limiter: Arc::new(limiter),
            denylist,
            validator: Arc::new(validator),
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }
}

fn validated(query: &WindowQuery) -> Result<(), ApiError> {
    match query.validate() {
        Some(msg) => Err(ApiError::InvalidRequest(msg)),
        None => Ok(()),
    }
}

/// Handler for GET /health
///
/// Checks the cache backend and the store. A cache outage only degrades
/// service; a store outage answers 503.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let cache = state.cache.health().await;

    let started = Instant::now();
    let store = match state.store.count().await {
        Ok(_) => StoreHealth {
            healthy: true,
            latency_ms: started.elapsed().as_secs_f64() * 1000.0,
            detail: None,
        },
        Err(e) => StoreHealth {
            healthy: false,
            latency_ms: started.elapsed().as_secs_f64() * 1000.0,
            detail: Some(e.to_string()),
        },
    };

    let response = HealthResponse::new(cache, store);
    let status = if response.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Handler for GET /stats/cache
pub async fn cache_stats_handler(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<CacheStatsResponse>, ApiError> {
    validated(&query)?;

    Ok(Json(CacheStatsResponse {
        backend: state.cache.stats().await.ok(),
        metrics: state.cache_metrics.snapshot(),
        window: query.window().map(|w| state.cache_metrics.windowed(w)),
    }))
}

/// Handler for GET /stats/db
pub async fn db_stats_handler(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<QueryStatsResponse>, ApiError> {
    validated(&query)?;

    Ok(Json(QueryStatsResponse {
        metrics: state.query_metrics.snapshot(),
        window: query.window().map(|w| state.query_metrics.windowed(w)),
    }))
}

/// Handler for GET /stats/rate-limit
pub async fn rate_limit_stats_handler(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<RateLimitStatsResponse>, ApiError> {
    validated(&query)?;

    let metrics = state.limiter.metrics();
    Ok(Json(RateLimitStatsResponse {
        metrics: metrics.snapshot(),
        window: query.window().map(|w| metrics.windowed(w)),
    }))
}

/// Handler for POST /stats/reset
///
/// Requires a valid, unrevoked bearer token.
pub async fn reset_stats_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ResetResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let claims = state.validator.validate(token).await?;

    state.cache_metrics.reset();
    state.query_metrics.reset();
    state.limiter.metrics().reset();
    info!(subject = %claims.sub, "metrics reset");

    Ok(Json(ResetResponse::new()))
}
