//! Table-scoped authorization decisions.
//!
//! Two tiers:
//! - [`AuthorizationEngine::can_perform`] answers "can this principal generally
//!   do X on this table" without loading any record.
//! - [`AuthorizationEngine::can_access_record`] answers "can they do X to *this*
//!   record" once the record (and its owner) is known.

use thiserror::Error;

use stratum_core::{StoreError, UserId};

use crate::registry::{self, InvalidResource, ManagedTable};
use crate::store::PermissionStore;
use crate::{CrudAction, PermissionGrant, PermissionPatch, PermissionScope, PermissionSet, TablePermission};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error(transparent)]
    InvalidResource(#[from] InvalidResource),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Evaluates and maintains per-principal permission sets.
///
/// Every call reads the store; there is no cache at this layer. A caching
/// store can be slotted in behind `S` without changing callers.
#[derive(Debug, Clone)]
pub struct AuthorizationEngine<S> {
    store: S,
}

impl<S> AuthorizationEngine<S>
where
    S: PermissionStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resource names that can carry permissions.
    pub fn all_tables(&self) -> Vec<&'static str> {
        registry::all_tables()
    }

    /// Full current permission mapping; empty when the principal has no rows.
    pub async fn get_permission_set(&self, principal_id: UserId) -> Result<PermissionSet, AuthzError> {
        let records = self.store.find_many_by_user(principal_id).await?;
        Ok(records
            .into_iter()
            .map(|r| (r.table_name, r.permission))
            .collect())
    }

    /// Table-level check.
    pub async fn can_perform(
        &self,
        principal_id: UserId,
        resource: &str,
        action: CrudAction,
        scope: Option<PermissionScope>,
    ) -> Result<bool, AuthzError> {
        registry::validate_resource(resource)?;

        let perms = self.get_permission_set(principal_id).await?;
        let allowed = perms
            .get(resource)
            .is_some_and(|perm| perm.permits(action, scope));

        tracing::debug!(
            user_id = %principal_id,
            resource,
            action = %action,
            scope = scope.map(PermissionScope::as_str),
            allowed,
            "can_perform"
        );
        Ok(allowed)
    }

    /// Row-level check for a record owned by `record_owner_id`.
    pub async fn can_access_record(
        &self,
        principal_id: UserId,
        resource: &str,
        action: CrudAction,
        record_owner_id: UserId,
    ) -> Result<bool, AuthzError> {
        registry::validate_resource(resource)?;

        let perms = self.get_permission_set(principal_id).await?;
        let allowed = perms
            .get(resource)
            .is_some_and(|perm| perm.permits_record(action, principal_id, record_owner_id));

        tracing::debug!(
            user_id = %principal_id,
            resource,
            action = %action,
            owner_id = %record_owner_id,
            allowed,
            "can_access_record"
        );
        Ok(allowed)
    }

    /// Replace the principal's permissions with `desired`.
    ///
    /// Full-replace semantics: resources currently granted but absent from
    /// `desired` are revoked. Every name is validated before anything is
    /// written; one invalid name rejects the whole call. When a resource
    /// appears more than once, the last entry wins.
    pub async fn set_permission_set(
        &self,
        principal_id: UserId,
        desired: Vec<PermissionGrant>,
    ) -> Result<(), AuthzError> {
        let invalid: Vec<&str> = desired
            .iter()
            .map(|g| g.table_name.as_str())
            .filter(|name| !registry::is_allowed_resource(name))
            .collect();
        if !invalid.is_empty() {
            let names = invalid.join(", ");
            tracing::warn!(user_id = %principal_id, tables = %names, "rejected permission set");
            return Err(InvalidResource(names).into());
        }

        let mut upsert: Vec<(String, TablePermission)> = Vec::with_capacity(desired.len());
        for grant in desired {
            match upsert.iter().position(|(name, _)| *name == grant.table_name) {
                Some(idx) => upsert[idx].1 = grant.permission,
                None => upsert.push((grant.table_name, grant.permission)),
            }
        }

        let tables = upsert.len();
        let revoked = self.store.replace_all(principal_id, upsert).await?;
        tracing::info!(user_id = %principal_id, tables, revoked, "permission set replaced");
        Ok(())
    }

    /// Create or update a single grant. Unset patch fields keep their current
    /// value; a new row starts with every flag off and scope `NONE`.
    pub async fn grant_permission(
        &self,
        principal_id: UserId,
        resource: &str,
        patch: PermissionPatch,
    ) -> Result<TablePermission, AuthzError> {
        let table: ManagedTable = registry::validate_resource(resource)?;

        let next = self.store.upsert_patch(principal_id, table.table_name(), patch).await?;
        tracing::info!(user_id = %principal_id, resource, scope = %next.scope, "permission granted");
        Ok(next)
    }

    /// Remove the principal's row for one resource.
    pub async fn revoke_table_permissions(&self, principal_id: UserId, resource: &str) -> Result<(), AuthzError> {
        let table = registry::validate_resource(resource)?;
        self.store.delete(principal_id, table.table_name()).await?;
        tracing::info!(user_id = %principal_id, resource, "permission revoked");
        Ok(())
    }
}
