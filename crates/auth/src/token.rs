//! Bearer-token strategy.

use std::sync::Arc;

use async_trait::async_trait;

use stratum_core::Clock;

use crate::claims::{TokenError, TokenVerifier};
use crate::directory::{AccountDirectory, resolve_active_principal};
use crate::{AuthError, AuthRequest, AuthStrategy, Principal};

/// Authenticates `Authorization: Bearer <jwt>` requests.
///
/// After the token verifies, the account and its tenant are re-read so that a
/// deactivated user or tenant loses access before the token expires.
pub struct TokenStrategy {
    verifier: Arc<dyn TokenVerifier>,
    directory: Arc<dyn AccountDirectory>,
    clock: Arc<dyn Clock>,
}

impl TokenStrategy {
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        directory: Arc<dyn AccountDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            verifier,
            directory,
            clock,
        }
    }
}

#[async_trait]
impl AuthStrategy for TokenStrategy {
    fn name(&self) -> &'static str {
        "token"
    }

    async fn authenticate(&self, request: &AuthRequest<'_>) -> Result<Principal, AuthError> {
        let token = request.bearer_token().inspect_err(|e| {
            tracing::debug!(reason = e.reason(), "no usable bearer token");
        })?;

        let claims = self
            .verifier
            .verify(token, self.clock.now())
            .map_err(|e| match e {
                TokenError::Expired => {
                    tracing::debug!("token expired");
                    AuthError::TokenExpired
                }
                TokenError::Malformed(detail) => {
                    tracing::debug!(%detail, "token rejected");
                    AuthError::InvalidToken
                }
                TokenError::InvalidPayload(claim) => {
                    tracing::debug!(claim, "token payload incomplete");
                    AuthError::InvalidPayload(claim)
                }
            })?;

        let principal = resolve_active_principal(self.directory.as_ref(), claims.sub)
            .await
            .inspect_err(|e| {
                tracing::warn!(user_id = %claims.sub, reason = e.reason(), "token principal rejected");
            })?;

        tracing::debug!(user_id = %principal.id, tenant_id = %principal.tenant_id, "token auth success");
        Ok(principal)
    }
}
