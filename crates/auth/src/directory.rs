//! Account lookup port used to re-validate principals on every request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use stratum_core::{RoleId, StoreResult, TenantId, UserId};

use crate::{AuthError, Principal};

/// Current state of a user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub tenant_id: TenantId,
    pub role_id: RoleId,
    pub is_active: bool,
}

/// Current state of a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantAccount {
    pub id: TenantId,
    pub name: String,
    pub is_active: bool,
}

/// Read-only view over user and tenant records.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find_user(&self, id: UserId) -> StoreResult<Option<UserAccount>>;

    async fn find_tenant(&self, id: TenantId) -> StoreResult<Option<TenantAccount>>;
}

#[async_trait]
impl<D> AccountDirectory for Arc<D>
where
    D: AccountDirectory + ?Sized,
{
    async fn find_user(&self, id: UserId) -> StoreResult<Option<UserAccount>> {
        (**self).find_user(id).await
    }

    async fn find_tenant(&self, id: TenantId) -> StoreResult<Option<TenantAccount>> {
        (**self).find_tenant(id).await
    }
}

/// Resolve a principal from its account, requiring both the account and its
/// tenant to exist and be active.
pub async fn resolve_active_principal(
    directory: &dyn AccountDirectory,
    user_id: UserId,
) -> Result<Principal, AuthError> {
    let user = directory
        .find_user(user_id)
        .await
        .map_err(AuthError::Directory)?
        .ok_or(AuthError::UserNotFound)?;

    if !user.is_active {
        return Err(AuthError::UserInactive);
    }

    let tenant = directory
        .find_tenant(user.tenant_id)
        .await
        .map_err(AuthError::Directory)?
        .ok_or(AuthError::TenantNotFound)?;

    if !tenant.is_active {
        return Err(AuthError::TenantInactive);
    }

    Ok(Principal {
        id: user.id,
        email: user.email,
        tenant_id: user.tenant_id,
        role_id: user.role_id,
    })
}
