//! HS256 token issuing and validation.

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;
use uuid::Uuid;

use super::Claims;
use crate::error::TokenError;

/// Lifetime of tokens issued by [`JwtService::issue`].
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self::with_access_ttl(secret, DEFAULT_ACCESS_TTL)
    }

    pub fn with_access_ttl(secret: &str, access_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
        }
    }

    /// Issues a token for `subject` valid for the configured lifetime.
    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        let ttl = chrono::Duration::from_std(self.access_ttl)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;
        self.issue_until(subject, Utc::now() + ttl)
    }

    /// Issues a token expiring at `expires_at`, which may lie in the past.
    pub fn issue_until(&self, subject: &str, expires_at: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject.to_string(),
            exp: expires_at.timestamp(),
            iat: Utc::now().timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }

    /// Verifies signature and expiry.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

/// Reads the `exp` claim without verifying the signature.
///
/// Fails if the token is not three dot-separated segments, the payload is
/// not base64url JSON, or it carries no integer `exp`.
pub fn unverified_expiry(token: &str) -> Result<DateTime<Utc>, TokenError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(TokenError::Malformed("expected three segments".to_string())),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| TokenError::Malformed(format!("payload is not base64url: {}", e)))?;
    let claim: ExpiryClaim = serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::Malformed(format!("payload has no usable exp: {}", e)))?;

    DateTime::from_timestamp(claim.exp, 0)
        .ok_or_else(|| TokenError::Malformed(format!("exp {} out of range", claim.exp)))
}
