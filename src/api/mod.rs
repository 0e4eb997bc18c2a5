//! API Module
//!
//! HTTP exposition of health and aggregated metrics.
//!
//! # Endpoints
//! - `GET /health` - Cache and store health
//! - `GET /stats/cache` - Cache statistics
//! - `GET /stats/db` - Store query statistics
//! - `GET /stats/rate-limit` - Rate limiter statistics
//! - `POST /stats/reset` - Reset all metrics

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
