//! Request/response bodies.

use serde::{Deserialize, Serialize};

use stratum_audit::AuditRecord;
use stratum_auth::{PermissionGrant, PermissionSet, Principal, TablePermission};
use stratum_core::UserId;

#[derive(Debug, Deserialize)]
pub struct SetPermissionsRequest {
    pub permissions: Vec<PermissionGrant>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPermissionsResponse {
    pub user_id: UserId,
    pub permissions: PermissionSet,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantResponse {
    pub user_id: UserId,
    pub table_name: String,
    pub permission: TablePermission,
}

#[derive(Debug, Serialize)]
pub struct TableInfo {
    pub name: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub tables: Vec<TableInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    pub strategy: &'static str,
    pub user: Principal,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AuditLogPage {
    pub data: Vec<AuditRecord>,
    pub page: u32,
    pub limit: u32,
}
