//! cachelayer - instrumented caching and invalidation layer
//!
//! A backend-agnostic cache with in-memory and Redis backends, a cache-aside
//! user repository with write invalidation, a TTL-bound token denylist, a
//! fixed-window rate limiter, and one generic metrics aggregator instantiated
//! for cache operations, store queries and rate-limit decisions.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod ratelimit;
pub mod repository;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use tasks::spawn_cleanup_task;
