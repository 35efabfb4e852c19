//! API-side permission checks.
//!
//! Table-level requirements are enforced by the guard from the route table;
//! handlers call [`require_record_access`] once they know whose record they
//! are about to touch.

use stratum_auth::{CrudAction, ManagedTable, PermissionRequirement, Principal};
use stratum_core::UserId;

use crate::app::Engine;
use crate::app::errors::ApiError;

/// Table-level check for the current principal.
pub async fn require(engine: &Engine, principal: &Principal, requirement: PermissionRequirement) -> Result<(), ApiError> {
    let allowed = engine
        .can_perform(
            principal.id,
            requirement.resource.table_name(),
            requirement.action,
            requirement.scope,
        )
        .await?;

    if !allowed {
        tracing::warn!(user_id = %principal.id, required = %requirement, "permission denied");
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// Row-level check for a record owned by `owner`.
pub async fn require_record_access(
    engine: &Engine,
    principal: &Principal,
    table: ManagedTable,
    action: CrudAction,
    owner: UserId,
) -> Result<(), ApiError> {
    let allowed = engine
        .can_access_record(principal.id, table.table_name(), action, owner)
        .await?;

    if !allowed {
        tracing::warn!(
            user_id = %principal.id,
            owner_id = %owner,
            resource = table.table_name(),
            action = %action,
            "record access denied"
        );
        return Err(ApiError::Forbidden);
    }
    Ok(())
}
