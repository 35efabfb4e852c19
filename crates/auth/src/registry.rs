//! Static allow-list of resources (tables) that carry CRUD permissions.
//!
//! This is the single source of truth for resource names: every component
//! validates here before a name reaches a permission store or an audit record.

use serde::{Serialize, Serializer};
use thiserror::Error;

/// A table whose rows are subject to CRUD×scope permissions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ManagedTable {
    AuditLogs,
    Tenants,
    Users,
    UserPermissions,
}

impl ManagedTable {
    /// Every managed table, in display order.
    pub const ALL: [ManagedTable; 4] = [
        ManagedTable::AuditLogs,
        ManagedTable::Tenants,
        ManagedTable::Users,
        ManagedTable::UserPermissions,
    ];

    /// SQL table name, which is also the resource name used in permission rows.
    pub fn table_name(self) -> &'static str {
        match self {
            ManagedTable::AuditLogs => "audit_logs",
            ManagedTable::Tenants => "tenants",
            ManagedTable::Users => "users",
            ManagedTable::UserPermissions => "user_permissions",
        }
    }

    /// Human-readable label for admin screens.
    pub fn label(self) -> &'static str {
        match self {
            ManagedTable::AuditLogs => "Audit logs",
            ManagedTable::Tenants => "Tenants",
            ManagedTable::Users => "Users",
            ManagedTable::UserPermissions => "Permissions",
        }
    }

    /// Exact (case-sensitive) lookup by table name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.table_name() == name)
    }
}

impl core::fmt::Display for ManagedTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.table_name())
    }
}

impl Serialize for ManagedTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.table_name())
    }
}

/// A resource name outside the allow-list. Always a client error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid table name: {0}")]
pub struct InvalidResource(pub String);

pub fn is_allowed_resource(name: &str) -> bool {
    ManagedTable::from_name(name).is_some()
}

/// Validate a resource name, returning the typed table on success.
pub fn validate_resource(name: &str) -> Result<ManagedTable, InvalidResource> {
    ManagedTable::from_name(name).ok_or_else(|| {
        tracing::warn!(table = %name, "invalid table name");
        InvalidResource(name.to_string())
    })
}

/// Names of all managed tables.
pub fn all_tables() -> Vec<&'static str> {
    ManagedTable::ALL.iter().map(|t| t.table_name()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_table_validates() {
        for name in all_tables() {
            assert!(is_allowed_resource(name));
            assert_eq!(validate_resource(name).unwrap().table_name(), name);
        }
    }

    #[test]
    fn allow_list_is_the_security_tables() {
        assert_eq!(all_tables(), vec!["audit_logs", "tenants", "users", "user_permissions"]);
        for name in ["clients", "invoices", "purchase_orders", "extendidos"] {
            assert!(!is_allowed_resource(name), "{name:?} should be rejected");
        }
    }

    #[test]
    fn lookup_is_exact() {
        for name in ["Users", " users", "users ", "user", "", "users;drop table users"] {
            assert!(!is_allowed_resource(name), "{name:?} should be rejected");
        }
    }

    #[test]
    fn invalid_resource_names_the_table() {
        let err = validate_resource("payroll").unwrap_err();
        assert_eq!(err, InvalidResource("payroll".to_string()));
        assert_eq!(err.to_string(), "Invalid table name: payroll");
    }

    #[test]
    fn serializes_as_table_name() {
        let json = serde_json::to_string(&ManagedTable::UserPermissions).unwrap();
        assert_eq!(json, "\"user_permissions\"");
    }
}
