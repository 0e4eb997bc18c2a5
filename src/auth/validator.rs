//! Token validation composed with the revocation check.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{Claims, JwtService};
use crate::config::FailMode;
use crate::error::{DenylistError, TokenError};

/// Capability to ask whether a token has been revoked.
#[async_trait]
pub trait DenylistChecker: Send + Sync {
    /// `Ok(true)` for revoked or unparseable tokens. `Err` only for a failure
    /// of the denylist itself.
    async fn is_revoked(&self, token: &str) -> Result<bool, DenylistError>;
}

/// Validates tokens, refusing revoked ones.
///
/// When the denylist cannot be consulted the configured [`FailMode`]
/// decides: `Open` logs and falls through to normal validation, `Closed`
/// rejects with `DenylistUnavailable`.
#[derive(Clone)]
pub struct GuardedValidator {
    jwt: JwtService,
    checker: Arc<dyn DenylistChecker>,
    fail_mode: FailMode,
}

impl GuardedValidator {
    pub fn new(jwt: JwtService, checker: Arc<dyn DenylistChecker>, fail_mode: FailMode) -> Self {
        Self {
            jwt,
            checker,
            fail_mode,
        }
    }

    pub fn fail_mode(&self) -> FailMode {
        self.fail_mode
    }

    pub async fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        match self.checker.is_revoked(token).await {
            Ok(true) => return Err(TokenError::Revoked),
            Ok(false) => {}
            Err(e) => match self.fail_mode {
                FailMode::Open => {
                    warn!(error = %e, "denylist check failed, continuing (fail-open)");
                }
                FailMode::Closed => {
                    warn!(error = %e, "denylist check failed, rejecting (fail-closed)");
                    return Err(TokenError::DenylistUnavailable(e.to_string()));
                }
            },
        }

        self.jwt.validate(token)
    }
}
