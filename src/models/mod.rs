//! Request and Response models for the stats exposition API

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::WindowQuery;
pub use responses::{
    CacheStatsResponse, HealthResponse, QueryStatsResponse, RateLimitStatsResponse,
    ResetResponse, StoreHealth,
};
