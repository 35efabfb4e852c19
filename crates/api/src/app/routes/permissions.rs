//! Permission administration endpoints.
//!
//! Table-level requirements are enforced by the guard (see the route table);
//! handlers here add the tenant boundary and row-level ownership checks.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};

use stratum_auth::{AccountDirectory, CrudAction, ManagedTable, PermissionPatch, Principal, UserAccount};
use stratum_core::UserId;

use crate::app::dto::{GrantResponse, SetPermissionsRequest, TableInfo, TablesResponse, UserPermissionsResponse};
use crate::app::errors::ApiError;
use crate::app::AppState;
use crate::authz;

pub(crate) fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid user id: {raw}")))
}

/// Load a user of the caller's tenant. Users of other tenants are reported
/// as missing.
pub(crate) async fn target_user(state: &AppState, principal: &Principal, raw_id: &str) -> Result<UserAccount, ApiError> {
    let id = parse_user_id(raw_id)?;
    match state.directory.find_user(id).await? {
        Some(user) if user.tenant_id == principal.tenant_id => Ok(user),
        _ => Err(ApiError::not_found("User not found")),
    }
}

/// GET /permissions/me
pub async fn me(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserPermissionsResponse>, ApiError> {
    let permissions = state.engine.get_permission_set(principal.id).await?;
    Ok(Json(UserPermissionsResponse {
        user_id: principal.id,
        permissions,
    }))
}

/// GET /permissions/tables
pub async fn tables() -> Json<TablesResponse> {
    Json(TablesResponse {
        tables: ManagedTable::ALL
            .iter()
            .map(|t| TableInfo {
                name: t.table_name(),
                label: t.label(),
            })
            .collect(),
    })
}

/// GET /permissions/user/:id
pub async fn for_user(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<UserPermissionsResponse>, ApiError> {
    let target = target_user(&state, &principal, &id).await?;
    authz::require_record_access(&state.engine, &principal, ManagedTable::Users, CrudAction::Read, target.id).await?;

    let permissions = state.engine.get_permission_set(target.id).await?;
    Ok(Json(UserPermissionsResponse {
        user_id: target.id,
        permissions,
    }))
}

/// PATCH /permissions/user/:id - full replace; omitted tables are revoked.
pub async fn replace_for_user(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<SetPermissionsRequest>,
) -> Result<Json<UserPermissionsResponse>, ApiError> {
    let target = target_user(&state, &principal, &id).await?;

    state.engine.set_permission_set(target.id, body.permissions).await?;
    tracing::info!(actor = %principal.id, target = %target.id, "permission set replaced");

    let permissions = state.engine.get_permission_set(target.id).await?;
    Ok(Json(UserPermissionsResponse {
        user_id: target.id,
        permissions,
    }))
}

/// PUT /permissions/user/:id/:table
pub async fn grant(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
    Path((id, table)): Path<(String, String)>,
    Json(patch): Json<PermissionPatch>,
) -> Result<Json<GrantResponse>, ApiError> {
    let target = target_user(&state, &principal, &id).await?;
    let permission = state.engine.grant_permission(target.id, &table, patch).await?;

    Ok(Json(GrantResponse {
        user_id: target.id,
        table_name: table,
        permission,
    }))
}

/// DELETE /permissions/user/:id/:table
pub async fn revoke(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
    Path((id, table)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let target = target_user(&state, &principal, &id).await?;
    state.engine.revoke_table_permissions(target.id, &table).await?;
    Ok(StatusCode::NO_CONTENT)
}
