//! Audit persistence port.

use async_trait::async_trait;
use std::sync::Arc;

use stratum_core::{StoreResult, TenantId, UserId};

use crate::AuditRecord;

/// 1-based page request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AuditPage {
    pub page: u32,
    pub limit: u32,
}

impl AuditPage {
    pub const MAX_LIMIT: u32 = 200;

    /// Clamp to `page >= 1` and `1 <= limit <= MAX_LIMIT`.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for AuditPage {
    fn default() -> Self {
        Self::new(1, 50)
    }
}

/// Append-only audit storage. Records are never updated or deleted through
/// this interface.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, record: AuditRecord) -> StoreResult<()>;

    /// Tenant's records, newest first.
    async fn list_by_tenant(&self, tenant_id: TenantId, page: AuditPage) -> StoreResult<Vec<AuditRecord>>;

    /// One user's records within a tenant, newest first.
    async fn list_by_user(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Vec<AuditRecord>>;
}

#[async_trait]
impl<S> AuditStore for Arc<S>
where
    S: AuditStore + ?Sized,
{
    async fn append(&self, record: AuditRecord) -> StoreResult<()> {
        (**self).append(record).await
    }

    async fn list_by_tenant(&self, tenant_id: TenantId, page: AuditPage) -> StoreResult<Vec<AuditRecord>> {
        (**self).list_by_tenant(tenant_id, page).await
    }

    async fn list_by_user(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Vec<AuditRecord>> {
        (**self).list_by_user(tenant_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_clamped() {
        assert_eq!(AuditPage::new(0, 0), AuditPage { page: 1, limit: 1 });
        assert_eq!(AuditPage::new(3, 10_000).limit, AuditPage::MAX_LIMIT);
        assert_eq!(AuditPage::new(3, 20).offset(), 40);
        assert_eq!(AuditPage::default().offset(), 0);
    }
}
