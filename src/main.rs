//! cachelayer - stats exposition server for the instrumented caching layer
//!
//! Composes the cache backend, the cache-aside user repository, the token
//! denylist and the rate limiter, then serves health and metrics over HTTP.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cachelayer::cache::{MemoryCache, RedisCache};
use cachelayer::repository::InMemoryUserRepository;
use cachelayer::{create_router, spawn_cleanup_task, AppState, Config};

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Connect the Redis backend, falling back to the in-memory backend with a
///    separate non-evicting store for revocations
/// 4. Compose the layer and start the background sweeper
/// 5. Serve HTTP until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cachelayer=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cachelayer");

    let config = Config::from_env();
    info!(
        "Configuration loaded: port={}, repository_ttl={}s, rate_limit={}/{}s, fail_mode={:?}",
        config.server_port,
        config.repository_cache_ttl,
        config.rate_limit_requests,
        config.rate_limit_window_secs,
        config.denylist_fail_mode
    );

    let users = InMemoryUserRepository::new();
    let redis = match &config.cache_url {
        Some(url) => match RedisCache::connect(url, config.cache_op_timeout()).await {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(error = %e, "Redis unavailable, falling back to in-memory cache");
                None
            }
        },
        None => None,
    };

    let (state, memory) = match redis {
        Some(cache) => (
            AppState::from_config(&config, cache.clone(), cache, users),
            Vec::new(),
        ),
        None => {
            let memory = MemoryCache::new(config.cache_max_entries);
            // Revocations must never be evicted by cache pressure
            let denylist = MemoryCache::unbounded();
            info!(max_entries = config.cache_max_entries, "In-memory cache initialized");
            (
                AppState::from_config(&config, memory.clone(), denylist.clone(), users),
                vec![memory, denylist],
            )
        }
    };

    let cleanup_handle = spawn_cleanup_task(
        memory,
        state.limiter.metrics().clone(),
        config.cleanup_interval,
    );
    info!("Background sweeper started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(cleanup_handle))
    .await
    .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, then aborts the sweeper.
async fn shutdown_signal(cleanup_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    cleanup_handle.abort();
    warn!("Sweeper task aborted");
}
