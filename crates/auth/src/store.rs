//! Permission persistence port.

use async_trait::async_trait;
use std::sync::Arc;

use stratum_core::{StoreResult, UserId};

use crate::{PermissionPatch, TablePermission};

/// Stored permission row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRecord {
    pub user_id: UserId,
    pub table_name: String,
    pub permission: TablePermission,
}

/// Storage for `(user, table) -> TablePermission` rows.
///
/// Implementations must keep at most one row per `(user_id, table_name)`.
/// Resource names reaching this trait have already been validated against
/// the registry.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn find_many_by_user(&self, user_id: UserId) -> StoreResult<Vec<PermissionRecord>>;

    async fn find_one(&self, user_id: UserId, table_name: &str) -> StoreResult<Option<TablePermission>>;

    /// Create or replace one row.
    async fn upsert(&self, user_id: UserId, table_name: &str, permission: TablePermission) -> StoreResult<()>;

    /// Apply `patch` to the current row (or an all-false `NONE` row when
    /// there is none) and store the result, as one atomic step. Returns the
    /// stored row.
    async fn upsert_patch(&self, user_id: UserId, table_name: &str, patch: PermissionPatch) -> StoreResult<TablePermission>;

    /// Delete one row; deleting a missing row is not an error.
    async fn delete(&self, user_id: UserId, table_name: &str) -> StoreResult<()>;

    /// Make `rows` the user's complete permission set: rows for tables not
    /// listed are deleted and every listed row is upserted. The comparison
    /// with existing rows happens inside the same atomic step, so a row
    /// written concurrently is either replaced or deleted. Returns the number
    /// of deleted rows.
    ///
    /// `rows` has unique table names. Stores that cannot make this atomic
    /// must return
    /// [`StoreError::TransactionUnsupported`](stratum_core::StoreError::TransactionUnsupported)
    /// without writing anything.
    async fn replace_all(&self, user_id: UserId, rows: Vec<(String, TablePermission)>) -> StoreResult<usize>;
}

#[async_trait]
impl<S> PermissionStore for Arc<S>
where
    S: PermissionStore + ?Sized,
{
    async fn find_many_by_user(&self, user_id: UserId) -> StoreResult<Vec<PermissionRecord>> {
        (**self).find_many_by_user(user_id).await
    }

    async fn find_one(&self, user_id: UserId, table_name: &str) -> StoreResult<Option<TablePermission>> {
        (**self).find_one(user_id, table_name).await
    }

    async fn upsert(&self, user_id: UserId, table_name: &str, permission: TablePermission) -> StoreResult<()> {
        (**self).upsert(user_id, table_name, permission).await
    }

    async fn upsert_patch(&self, user_id: UserId, table_name: &str, patch: PermissionPatch) -> StoreResult<TablePermission> {
        (**self).upsert_patch(user_id, table_name, patch).await
    }

    async fn delete(&self, user_id: UserId, table_name: &str) -> StoreResult<()> {
        (**self).delete(user_id, table_name).await
    }

    async fn replace_all(&self, user_id: UserId, rows: Vec<(String, TablePermission)>) -> StoreResult<usize> {
        (**self).replace_all(user_id, rows).await
    }
}
