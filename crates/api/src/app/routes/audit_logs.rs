use axum::{
    extract::{Extension, Path, Query},
    Json,
};

use stratum_audit::{AuditPage, AuditRecord, AuditStore};
use stratum_auth::{CrudAction, ManagedTable, Principal};

use crate::app::dto::{AuditLogPage, PageQuery};
use crate::app::errors::ApiError;
use crate::app::routes::permissions::target_user;
use crate::app::AppState;
use crate::authz;

/// GET /audit-logs?page=&limit= - caller's tenant, newest first.
pub async fn list(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<PageQuery>,
) -> Result<Json<AuditLogPage>, ApiError> {
    let defaults = AuditPage::default();
    let page = AuditPage::new(
        query.page.unwrap_or(defaults.page),
        query.limit.unwrap_or(defaults.limit),
    );

    let data = state.audit.list_by_tenant(principal.tenant_id, page).await?;
    Ok(Json(AuditLogPage {
        data,
        page: page.page,
        limit: page.limit,
    }))
}

/// GET /audit-logs/user/:id
pub async fn for_user(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AuditRecord>>, ApiError> {
    let target = target_user(&state, &principal, &id).await?;
    authz::require_record_access(&state.engine, &principal, ManagedTable::AuditLogs, CrudAction::Read, target.id).await?;

    Ok(Json(state.audit.list_by_user(principal.tenant_id, target.id).await?))
}
