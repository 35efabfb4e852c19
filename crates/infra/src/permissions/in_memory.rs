use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use stratum_auth::{PermissionPatch, PermissionRecord, PermissionStore, TablePermission};
use stratum_core::{StoreError, StoreResult, UserId};

/// In-memory permission rows for tests/dev.
///
/// `replace_all` and `upsert_patch` read and write under one write lock, so
/// concurrent writers never interleave with them.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    inner: RwLock<HashMap<(UserId, String), TablePermission>>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows across all users.
    pub fn row_count(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }
}

fn poisoned() -> StoreError {
    StoreError::backend("permission store lock poisoned")
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn find_many_by_user(&self, user_id: UserId) -> StoreResult<Vec<PermissionRecord>> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        let mut records: Vec<PermissionRecord> = map
            .iter()
            .filter(|((uid, _), _)| *uid == user_id)
            .map(|((uid, table), perm)| PermissionRecord {
                user_id: *uid,
                table_name: table.clone(),
                permission: *perm,
            })
            .collect();
        records.sort_by(|a, b| a.table_name.cmp(&b.table_name));
        Ok(records)
    }

    async fn find_one(&self, user_id: UserId, table_name: &str) -> StoreResult<Option<TablePermission>> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&(user_id, table_name.to_string())).copied())
    }

    async fn upsert(&self, user_id: UserId, table_name: &str, permission: TablePermission) -> StoreResult<()> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.insert((user_id, table_name.to_string()), permission);
        Ok(())
    }

    async fn upsert_patch(&self, user_id: UserId, table_name: &str, patch: PermissionPatch) -> StoreResult<TablePermission> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let row = map.entry((user_id, table_name.to_string())).or_default();
        *row = row.patched(&patch);
        Ok(*row)
    }

    async fn delete(&self, user_id: UserId, table_name: &str) -> StoreResult<()> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.remove(&(user_id, table_name.to_string()));
        Ok(())
    }

    async fn replace_all(&self, user_id: UserId, rows: Vec<(String, TablePermission)>) -> StoreResult<usize> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let before = map.len();
        map.retain(|(uid, table), _| *uid != user_id || rows.iter().any(|(name, _)| name == table));
        let revoked = before - map.len();
        for (table, permission) in rows {
            map.insert((user_id, table), permission);
        }
        Ok(revoked)
    }
}
