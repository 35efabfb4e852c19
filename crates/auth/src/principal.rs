use serde::{Deserialize, Serialize};

use stratum_core::{RoleId, TenantId, UserId};

/// Authenticated identity for the duration of one request.
///
/// Resolved fresh from the account directory on every request; never persisted
/// by the access-control pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: UserId,
    pub email: String,
    pub tenant_id: TenantId,
    pub role_id: RoleId,
}
