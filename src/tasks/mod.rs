//! Background Tasks Module
//!
//! # Tasks
//! - Sweeper: purges expired in-memory cache entries and stale
//!   rate-limit violation records at configured intervals

mod cleanup;

pub use cleanup::spawn_cleanup_task;
