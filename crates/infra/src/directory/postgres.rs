//! Read-only lookups over the `users` and `tenants` tables.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;

use stratum_auth::{AccountDirectory, TenantAccount, UserAccount};
use stratum_core::{RoleId, StoreError, StoreResult, TenantId, UserId};

use crate::pg::map_sqlx_error;

#[derive(Debug, Clone)]
pub struct PostgresAccountDirectory {
    pool: PgPool,
}

impl PostgresAccountDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn corrupt(e: sqlx::Error) -> StoreError {
    StoreError::Corrupt(e.to_string())
}

#[async_trait]
impl AccountDirectory for PostgresAccountDirectory {
    #[instrument(skip(self), err)]
    async fn find_user(&self, id: UserId) -> StoreResult<Option<UserAccount>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, tenant_id, role_id, is_active
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(UserAccount {
            id: UserId::from_uuid(row.try_get("id").map_err(corrupt)?),
            email: row.try_get("email").map_err(corrupt)?,
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id").map_err(corrupt)?),
            role_id: RoleId::from_uuid(row.try_get("role_id").map_err(corrupt)?),
            is_active: row.try_get("is_active").map_err(corrupt)?,
        }))
    }

    #[instrument(skip(self), err)]
    async fn find_tenant(&self, id: TenantId) -> StoreResult<Option<TenantAccount>> {
        let row = sqlx::query("SELECT id, name, is_active FROM tenants WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_tenant", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(TenantAccount {
            id: TenantId::from_uuid(row.try_get("id").map_err(corrupt)?),
            name: row.try_get("name").map_err(corrupt)?,
            is_active: row.try_get("is_active").map_err(corrupt)?,
        }))
    }
}
