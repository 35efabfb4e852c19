//! Postgres-backed audit log (`audit_logs`, insert-only).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use stratum_audit::{AuditAction, AuditPage, AuditRecord, AuditStore, EntityType};
use stratum_core::{StoreError, StoreResult, TenantId, UserId};

use crate::pg::map_sqlx_error;

const SELECT_COLUMNS: &str =
    "id, tenant_id, user_id, action, entity_type, entity_id, changes, created_at, ip_address, user_agent";

#[derive(Debug, Clone)]
pub struct PostgresAuditStore {
    pool: PgPool,
}

impl PostgresAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// SQLx row types

#[derive(Debug)]
struct AuditRow {
    id: Uuid,
    tenant_id: Option<Uuid>,
    user_id: Option<Uuid>,
    action: String,
    entity_type: String,
    entity_id: String,
    changes: serde_json::Value,
    created_at: DateTime<Utc>,
    ip_address: String,
    user_agent: String,
}

impl AuditRow {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            user_id: row.try_get("user_id")?,
            action: row.try_get("action")?,
            entity_type: row.try_get("entity_type")?,
            entity_id: row.try_get("entity_id")?,
            changes: row.try_get("changes")?,
            created_at: row.try_get("created_at")?,
            ip_address: row.try_get("ip_address")?,
            user_agent: row.try_get("user_agent")?,
        })
    }
}

impl TryFrom<AuditRow> for AuditRecord {
    type Error = StoreError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let action = AuditAction::parse(&row.action)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown audit action '{}'", row.action)))?;
        let entity_type = EntityType::parse(&row.entity_type)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown entity type '{}'", row.entity_type)))?;

        Ok(AuditRecord {
            id: row.id,
            tenant_id: row.tenant_id.map(TenantId::from_uuid),
            user_id: row.user_id.map(UserId::from_uuid),
            action,
            entity_type,
            entity_id: row.entity_id,
            changes: row.changes,
            timestamp: row.created_at,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
        })
    }
}

fn decode_rows(rows: Vec<sqlx::postgres::PgRow>) -> StoreResult<Vec<AuditRecord>> {
    rows.iter()
        .map(|row| {
            AuditRow::from_row(row)
                .map_err(|e| StoreError::Corrupt(format!("failed to deserialize audit row: {}", e)))
                .and_then(AuditRecord::try_from)
        })
        .collect()
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    #[instrument(
        skip(self, record),
        fields(action = record.action.as_str(), entity_id = %record.entity_id),
        err
    )]
    async fn append(&self, record: AuditRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs
                (id, tenant_id, user_id, action, entity_type, entity_id, changes, created_at, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(record.tenant_id.map(Uuid::from))
        .bind(record.user_id.map(Uuid::from))
        .bind(record.action.as_str())
        .bind(record.entity_type.as_str())
        .bind(&record.entity_id)
        .bind(&record.changes)
        .bind(record.timestamp)
        .bind(&record.ip_address)
        .bind(&record.user_agent)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("append_audit", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_by_tenant(&self, tenant_id: TenantId, page: AuditPage) -> StoreResult<Vec<AuditRecord>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM audit_logs WHERE tenant_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(i64::from(page.limit))
            .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_audit_by_tenant", e))?;
        decode_rows(rows)
    }

    #[instrument(skip(self), err)]
    async fn list_by_user(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Vec<AuditRecord>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM audit_logs WHERE tenant_id = $1 AND user_id = $2 ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_audit_by_user", e))?;
        decode_rows(rows)
    }
}
