//! Development-only strategy that resolves a fixed, pre-seeded principal.

use std::sync::Arc;

use async_trait::async_trait;

use stratum_core::{Environment, UserId};

use crate::directory::{AccountDirectory, resolve_active_principal};
use crate::{AuthError, AuthRequest, AuthStrategy, Principal};

/// Skips credential checks and authenticates every request as one seeded user.
///
/// Refuses to exist outside [`Environment::Development`], and re-checks the
/// environment on every call.
pub struct BypassStrategy {
    environment: Environment,
    principal_id: UserId,
    directory: Arc<dyn AccountDirectory>,
}

impl BypassStrategy {
    pub fn new(
        environment: Environment,
        principal_id: UserId,
        directory: Arc<dyn AccountDirectory>,
    ) -> Result<Self, AuthError> {
        ensure_development(environment)?;
        tracing::warn!(user_id = %principal_id, "bypass authentication enabled");
        Ok(Self {
            environment,
            principal_id,
            directory,
        })
    }
}

fn ensure_development(environment: Environment) -> Result<(), AuthError> {
    if environment.is_development() {
        Ok(())
    } else {
        Err(AuthError::BypassUnavailable(environment))
    }
}

#[async_trait]
impl AuthStrategy for BypassStrategy {
    fn name(&self) -> &'static str {
        "bypass"
    }

    async fn authenticate(&self, _request: &AuthRequest<'_>) -> Result<Principal, AuthError> {
        ensure_development(self.environment)?;

        let principal = resolve_active_principal(self.directory.as_ref(), self.principal_id)
            .await
            .inspect_err(|e| {
                tracing::error!(user_id = %self.principal_id, reason = e.reason(), "bypass auth failed");
            })?;

        tracing::debug!(user_id = %principal.id, "bypass auth success");
        Ok(principal)
    }
}
