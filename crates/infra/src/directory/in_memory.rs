use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use stratum_auth::{AccountDirectory, TenantAccount, UserAccount};
use stratum_core::{StoreError, StoreResult, TenantId, UserId};

/// In-memory user/tenant records for tests/dev, seeded explicitly.
#[derive(Debug, Default)]
pub struct InMemoryAccountDirectory {
    users: RwLock<HashMap<UserId, UserAccount>>,
    tenants: RwLock<HashMap<TenantId, TenantAccount>>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tenant(&self, tenant: TenantAccount) {
        if let Ok(mut map) = self.tenants.write() {
            map.insert(tenant.id, tenant);
        }
    }

    pub fn insert_user(&self, user: UserAccount) {
        if let Ok(mut map) = self.users.write() {
            map.insert(user.id, user);
        }
    }

    pub fn set_user_active(&self, id: UserId, is_active: bool) {
        if let Ok(mut map) = self.users.write() {
            if let Some(user) = map.get_mut(&id) {
                user.is_active = is_active;
            }
        }
    }

    pub fn set_tenant_active(&self, id: TenantId, is_active: bool) {
        if let Ok(mut map) = self.tenants.write() {
            if let Some(tenant) = map.get_mut(&id) {
                tenant.is_active = is_active;
            }
        }
    }
}

fn poisoned() -> StoreError {
    StoreError::backend("account directory lock poisoned")
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn find_user(&self, id: UserId) -> StoreResult<Option<UserAccount>> {
        let map = self.users.read().map_err(|_| poisoned())?;
        Ok(map.get(&id).cloned())
    }

    async fn find_tenant(&self, id: TenantId) -> StoreResult<Option<TenantAccount>> {
        let map = self.tenants.read().map_err(|_| poisoned())?;
        Ok(map.get(&id).cloned())
    }
}
