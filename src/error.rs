//! Error types for the caching layer
//!
//! Provides unified error handling using thiserror. Cache errors are absorbed
//! wherever a safe fallback exists; store and denylist errors are surfaced.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Failures reported by a cache backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Backend connection or protocol failure
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// Backend call exceeded its deadline
    #[error("Cache operation timed out after {0}ms")]
    Timeout(u64),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Key rejected by the backend
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Increment/decrement applied to a non-integer value
    #[error("Value at key is not an integer: {0}")]
    NotNumeric(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == Store Error Enum ==
/// Failures reported by the backing store. A missing row on lookup is not an
/// error; `NotFound` is only returned by writes that target a missing entity.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Backing store unavailable: {0}")]
    Unavailable(String),
}

// == Denylist Error Enum ==
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DenylistError {
    /// Token could not be decoded at all
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// The cache holding the denylist failed
    #[error("Denylist backend failure: {0}")]
    Backend(#[from] CacheError),
}

// == Token Error Enum ==
/// Token validation failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token has been revoked")]
    Revoked,

    /// Denylist lookup failed while configured fail-closed
    #[error("Denylist unavailable: {0}")]
    DenylistUnavailable(String),
}

impl TokenError {
    /// Returns `true` when the token itself is unusable, as opposed to an
    /// infrastructure failure during the check.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, TokenError::DenylistUnavailable(_))
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                TokenError::Malformed(err.to_string())
            }
            _ => TokenError::Invalid(err.to_string()),
        }
    }
}

// == Api Error Enum ==
/// Errors returned by the stats exposition endpoints.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing, invalid or revoked bearer token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A dependency needed to answer is down
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        if err.is_rejection() {
            ApiError::Unauthorized(err.to_string())
        } else {
            ApiError::Unavailable(err.to_string())
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// == Result Type Aliases ==
/// Convenience Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Convenience Result type for backing-store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denylist_error_from_cache_error() {
        let err: DenylistError = CacheError::Timeout(500).into();
        assert!(matches!(err, DenylistError::Backend(CacheError::Timeout(500))));
    }

    #[test]
    fn test_token_error_rejection_classification() {
        assert!(TokenError::Revoked.is_rejection());
        assert!(TokenError::Expired.is_rejection());
        assert!(!TokenError::DenylistUnavailable("down".to_string()).is_rejection());
    }

    #[test]
    fn test_api_error_status() {
        let response = ApiError::InvalidRequest("bad window".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_api_error_from_token_error() {
        let revoked: ApiError = TokenError::Revoked.into();
        assert_eq!(revoked.into_response().status(), StatusCode::UNAUTHORIZED);

        let down: ApiError = TokenError::DenylistUnavailable("timeout".to_string()).into();
        assert_eq!(down.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
