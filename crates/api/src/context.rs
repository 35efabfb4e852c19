use std::sync::{Arc, OnceLock};

use stratum_auth::Principal;

/// Per-request tracing identity.
///
/// Inserted by the request-id middleware before anything else runs. The
/// principal slot is shared so layers outside the guard (the exception
/// pipeline) can see who the caller was after the inner service returns.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Arc<str>,
    principal: Arc<OnceLock<Principal>>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<Arc<str>>) -> Self {
        Self {
            request_id: request_id.into(),
            principal: Arc::new(OnceLock::new()),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Attach the authenticated principal. Only the first call has an effect.
    pub fn attach_principal(&self, principal: Principal) {
        let _ = self.principal.set(principal);
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::{RoleId, TenantId, UserId};

    #[test]
    fn clones_share_the_principal_slot() {
        let ctx = RequestContext::new("req-1");
        let seen_by_outer_layer = ctx.clone();
        assert!(seen_by_outer_layer.principal().is_none());

        let principal = Principal {
            id: UserId::new(),
            email: "a@b.test".to_string(),
            tenant_id: TenantId::new(),
            role_id: RoleId::new(),
        };
        ctx.attach_principal(principal.clone());

        assert_eq!(seen_by_outer_layer.principal(), Some(&principal));
        assert_eq!(seen_by_outer_layer.request_id(), "req-1");
    }
}
