//! API Routes
//!
//! Configures the Axum router with the exposition endpoints.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cache_stats_handler, db_stats_handler, health_handler, rate_limit_stats_handler,
    reset_stats_handler, AppState,
};
use super::middleware::rate_limit;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Cache and store health
/// - `GET /stats/cache` - Cache hit/miss and operation statistics
/// - `GET /stats/db` - Store query statistics and slow-query log
/// - `GET /stats/rate-limit` - Throttling effectiveness and top violators
/// - `POST /stats/reset` - Zero every aggregator (bearer token required)
///
/// The stats endpoints accept `?window_secs=N` for windowed metrics and are
/// rate limited per client IP; `/health` is not.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let stats = Router::new()
        .route("/stats/cache", get(cache_stats_handler))
        .route("/stats/db", get(db_stats_handler))
        .route("/stats/rate-limit", get(rate_limit_stats_handler))
        .route("/stats/reset", post(reset_stats_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(health_handler))
        .merge(stats)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::Config;
    use crate::repository::InMemoryUserRepository;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app(config: &Config) -> Router {
        create_router(AppState::from_config(
            config,
            MemoryCache::new(100),
            MemoryCache::unbounded(),
            InMemoryUserRepository::new(),
        ))
    }

    async fn status_of(request: Request<Body>) -> StatusCode {
        create_test_app(&Config::default())
            .oneshot(request)
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        assert_eq!(status_of(request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoints() {
        for uri in ["/stats/cache", "/stats/db", "/stats/rate-limit?window_secs=60"] {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            assert_eq!(status_of(request).await, StatusCode::OK, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_invalid_window_rejected() {
        let request = Request::builder()
            .uri("/stats/db?window_secs=0")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reset_requires_post_and_token() {
        let request = Request::builder()
            .uri("/stats/reset")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::METHOD_NOT_ALLOWED);

        let request = Request::builder()
            .method("POST")
            .uri("/stats/reset")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_stats_are_rate_limited() {
        let config = Config {
            rate_limit_requests: 2,
            ..Config::default()
        };
        let app = create_test_app(&config);

        let mut statuses = Vec::new();
        for _ in 0..3 {
            let request = Request::builder()
                .uri("/stats/db")
                .header("x-forwarded-for", "198.51.100.9")
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            statuses.push(response.status());
        }

        assert_eq!(
            statuses,
            vec![StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        );
    }

    #[tokio::test]
    async fn test_spoofed_forwarded_for_does_not_reset_limit() {
        let config = Config {
            rate_limit_requests: 1,
            ..Config::default()
        };
        let app = create_test_app(&config);

        let mut statuses = Vec::new();
        for i in 0..3 {
            let request = Request::builder()
                .uri("/stats/db")
                .header("x-forwarded-for", format!("198.51.100.{}", i))
                .body(Body::empty())
                .unwrap();
            statuses.push(app.clone().oneshot(request).await.unwrap().status());
        }

        assert_eq!(
            statuses,
            vec![
                StatusCode::OK,
                StatusCode::TOO_MANY_REQUESTS,
                StatusCode::TOO_MANY_REQUESTS
            ]
        );
    }

    #[tokio::test]
    async fn test_forwarded_for_honoured_when_trusted() {
        let config = Config {
            rate_limit_requests: 1,
            trust_forwarded_for: true,
            ..Config::default()
        };
        let app = create_test_app(&config);

        for i in 0..3 {
            let request = Request::builder()
                .uri("/stats/db")
                .header("x-forwarded-for", format!("198.51.100.{}", i))
                .body(Body::empty())
                .unwrap();
            assert_eq!(app.clone().oneshot(request).await.unwrap().status(), StatusCode::OK);
        }
    }
}
