//! Postgres-backed permission rows.
//!
//! Table `user_permissions` with primary key `(user_id, table_name)`; see
//! `migrations/0001_security.sql`.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use stratum_auth::{PermissionPatch, PermissionRecord, PermissionScope, PermissionStore, TablePermission};
use stratum_core::{StoreError, StoreResult, UserId};

use crate::pg::map_sqlx_error;

const UPSERT_SQL: &str = r#"
    INSERT INTO user_permissions
        (user_id, table_name, can_create, can_read, can_update, can_delete, scope, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, now())
    ON CONFLICT (user_id, table_name) DO UPDATE SET
        can_create = EXCLUDED.can_create,
        can_read = EXCLUDED.can_read,
        can_update = EXCLUDED.can_update,
        can_delete = EXCLUDED.can_delete,
        scope = EXCLUDED.scope,
        updated_at = now()
"#;

/// Unset patch fields keep the stored value; a new row starts all-false/`NONE`.
const UPSERT_PATCH_SQL: &str = r#"
    INSERT INTO user_permissions
        (user_id, table_name, can_create, can_read, can_update, can_delete, scope, updated_at)
    VALUES ($1, $2, COALESCE($3, false), COALESCE($4, false), COALESCE($5, false), COALESCE($6, false),
            COALESCE($7, 'NONE'), now())
    ON CONFLICT (user_id, table_name) DO UPDATE SET
        can_create = COALESCE($3, user_permissions.can_create),
        can_read = COALESCE($4, user_permissions.can_read),
        can_update = COALESCE($5, user_permissions.can_update),
        can_delete = COALESCE($6, user_permissions.can_delete),
        scope = COALESCE($7, user_permissions.scope),
        updated_at = now()
    RETURNING can_create, can_read, can_update, can_delete, scope
"#;

const DELETE_SQL: &str = "DELETE FROM user_permissions WHERE user_id = $1 AND table_name = $2";

const DELETE_OMITTED_SQL: &str = "DELETE FROM user_permissions WHERE user_id = $1 AND table_name <> ALL($2)";

/// Transaction-scoped lock on one user's rows. Every multi-row write takes it
/// first, so a replace and a concurrent grant for the same user serialize.
const LOCK_USER_SQL: &str = "SELECT pg_advisory_xact_lock(hashtextextended($1, 0))";

#[derive(Debug, Clone)]
pub struct PostgresPermissionStore {
    pool: PgPool,
}

impl PostgresPermissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin_for_user(&self, user_id: UserId) -> StoreResult<Transaction<'static, Postgres>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query(LOCK_USER_SQL)
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_user", e))?;
        Ok(tx)
    }
}

fn decode_permission(row: &sqlx::postgres::PgRow) -> StoreResult<TablePermission> {
    let scope: String = row
        .try_get("scope")
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let scope: PermissionScope = scope
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown permission scope '{}'", scope)))?;
    let flag = |name: &str| -> StoreResult<bool> { row.try_get(name).map_err(|e| StoreError::Corrupt(e.to_string())) };

    Ok(TablePermission {
        can_create: flag("can_create")?,
        can_read: flag("can_read")?,
        can_update: flag("can_update")?,
        can_delete: flag("can_delete")?,
        scope,
    })
}

async fn upsert_in(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    table_name: &str,
    permission: &TablePermission,
) -> Result<(), sqlx::Error> {
    sqlx::query(UPSERT_SQL)
        .bind(user_id.as_uuid())
        .bind(table_name)
        .bind(permission.can_create)
        .bind(permission.can_read)
        .bind(permission.can_update)
        .bind(permission.can_delete)
        .bind(permission.scope.as_str())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[async_trait]
impl PermissionStore for PostgresPermissionStore {
    #[instrument(skip(self), err)]
    async fn find_many_by_user(&self, user_id: UserId) -> StoreResult<Vec<PermissionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT table_name, can_create, can_read, can_update, can_delete, scope
            FROM user_permissions
            WHERE user_id = $1
            ORDER BY table_name ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_many_by_user", e))?;

        rows.iter()
            .map(|row| {
                let table_name: String = row
                    .try_get("table_name")
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?;
                Ok(PermissionRecord {
                    user_id,
                    table_name,
                    permission: decode_permission(row)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn find_one(&self, user_id: UserId, table_name: &str) -> StoreResult<Option<TablePermission>> {
        let row = sqlx::query(
            r#"
            SELECT can_create, can_read, can_update, can_delete, scope
            FROM user_permissions
            WHERE user_id = $1 AND table_name = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(table_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_one", e))?;

        row.as_ref().map(decode_permission).transpose()
    }

    #[instrument(skip(self, permission), err)]
    async fn upsert(&self, user_id: UserId, table_name: &str, permission: TablePermission) -> StoreResult<()> {
        let mut tx = self.begin_for_user(user_id).await?;
        upsert_in(&mut tx, user_id, table_name, &permission)
            .await
            .map_err(|e| map_sqlx_error("upsert", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }

    #[instrument(skip(self), err)]
    async fn upsert_patch(&self, user_id: UserId, table_name: &str, patch: PermissionPatch) -> StoreResult<TablePermission> {
        let mut tx = self.begin_for_user(user_id).await?;
        let row = sqlx::query(UPSERT_PATCH_SQL)
            .bind(user_id.as_uuid())
            .bind(table_name)
            .bind(patch.can_create)
            .bind(patch.can_read)
            .bind(patch.can_update)
            .bind(patch.can_delete)
            .bind(patch.scope.map(PermissionScope::as_str))
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("upsert_patch", e))?;
        let permission = decode_permission(&row)?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(permission)
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, user_id: UserId, table_name: &str) -> StoreResult<()> {
        sqlx::query(DELETE_SQL)
            .bind(user_id.as_uuid())
            .bind(table_name)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;
        Ok(())
    }

    /// Deletes omitted tables and upserts the rest in one transaction, under
    /// the per-user lock. Dropping the transaction on an early return rolls
    /// it back.
    #[instrument(skip(self, rows), fields(tables = rows.len()), err)]
    async fn replace_all(&self, user_id: UserId, rows: Vec<(String, TablePermission)>) -> StoreResult<usize> {
        let mut tx = self.begin_for_user(user_id).await?;

        let keep: Vec<&str> = rows.iter().map(|(name, _)| name.as_str()).collect();
        let revoked = sqlx::query(DELETE_OMITTED_SQL)
            .bind(user_id.as_uuid())
            .bind(&keep)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("replace_all.delete", e))?
            .rows_affected();

        for (table_name, permission) in &rows {
            upsert_in(&mut tx, user_id, table_name, permission)
                .await
                .map_err(|e| map_sqlx_error("replace_all.upsert", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(revoked as usize)
    }
}
