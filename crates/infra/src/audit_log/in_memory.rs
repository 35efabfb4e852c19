use std::sync::RwLock;

use async_trait::async_trait;

use stratum_audit::{AuditPage, AuditRecord, AuditStore};
use stratum_core::{StoreError, StoreResult, TenantId, UserId};

/// Append-only in-memory audit log for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record in insertion order.
    pub fn snapshot(&self) -> Vec<AuditRecord> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }
}

fn poisoned() -> StoreError {
    StoreError::backend("audit store lock poisoned")
}

fn newest_first(mut records: Vec<AuditRecord>) -> Vec<AuditRecord> {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, record: AuditRecord) -> StoreResult<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        records.push(record);
        Ok(())
    }

    async fn list_by_tenant(&self, tenant_id: TenantId, page: AuditPage) -> StoreResult<Vec<AuditRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        let matching = records
            .iter()
            .filter(|r| r.tenant_id == Some(tenant_id))
            .cloned()
            .collect();
        Ok(newest_first(matching)
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.limit as usize)
            .collect())
    }

    async fn list_by_user(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Vec<AuditRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        let matching = records
            .iter()
            .filter(|r| r.tenant_id == Some(tenant_id) && r.user_id == Some(user_id))
            .cloned()
            .collect();
        Ok(newest_first(matching))
    }
}
