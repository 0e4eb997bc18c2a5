//! Sweeper Task
//!
//! Background task that purges expired in-memory cache entries and
//! rate-limit violation records past their retention window.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoryCache;
use crate::metrics::RateLimitMetrics;

/// Spawns a background task that sweeps expired state every
/// `cleanup_interval_secs` seconds.
///
/// `memory` lists the in-memory caches to sweep; it is empty when a
/// networked backend handles its own expiry.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_cleanup_task(
    memory: Vec<MemoryCache>,
    rate_limits: Arc<RateLimitMetrics>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting sweeper task with interval of {} seconds",
            cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let mut expired = 0;
            for cache in &memory {
                expired += cache.cleanup_expired().await;
            }
            let stale = rate_limits.purge_stale();

            if expired > 0 || stale > 0 {
                info!(
                    "Sweep: removed {} expired cache entries, {} stale violators",
                    expired, stale
                );
            } else {
                debug!("Sweep: nothing to remove");
            }
        }
    })
}
