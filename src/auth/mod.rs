//! Auth Module
//!
//! Token issuing and validation, plus the revocation denylist. Validation
//! depends on the narrow [`DenylistChecker`] capability rather than the
//! concrete [`TokenDenylist`], which is injected at composition time.

mod denylist;
mod jwt;
mod validator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use denylist::{denylist_key, BatchRevocation, RevokeOutcome, TokenDenylist};
pub use jwt::{unverified_expiry, JwtService, DEFAULT_ACCESS_TTL};
pub use validator::{DenylistChecker, GuardedValidator};

/// Claims carried by issued tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject, the user id
    pub sub: String,
    /// Expiry as seconds since the Unix epoch
    pub exp: i64,
    /// Issued-at as seconds since the Unix epoch
    pub iat: i64,
    /// Unique token id
    pub jti: String,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}
