//! Route metadata consulted by the guard: which routes are public and which
//! table permission each protected route requires.

use std::collections::HashMap;

use axum::http::Method;

use stratum_auth::{CrudAction, ManagedTable, PermissionRequirement, PermissionScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// No authentication at all.
    Public,
    /// Authenticated; optionally a table-level permission check on top.
    Protected(Option<PermissionRequirement>),
}

/// `(method, matched path) -> access` side table.
///
/// Paths are the route templates as registered with the router (e.g.
/// `/permissions/user/:id`), which is what `MatchedPath` reports.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: HashMap<(Method, String), RouteAccess>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn public(mut self, method: Method, path: &str) -> Self {
        self.rules.insert((method, path.to_string()), RouteAccess::Public);
        self
    }

    pub fn authenticated(mut self, method: Method, path: &str) -> Self {
        self.rules.insert((method, path.to_string()), RouteAccess::Protected(None));
        self
    }

    pub fn require(mut self, method: Method, path: &str, requirement: PermissionRequirement) -> Self {
        self.rules
            .insert((method, path.to_string()), RouteAccess::Protected(Some(requirement)));
        self
    }

    /// Access rule for a route. `HEAD` is answered by the `GET` handler, so it
    /// gets the `GET` rule. Routes missing from the table require an
    /// authenticated caller and nothing more.
    pub fn lookup(&self, method: &Method, path: &str) -> RouteAccess {
        let method = if method == Method::HEAD { Method::GET } else { method.clone() };
        self.rules
            .get(&(method, path.to_string()))
            .copied()
            .unwrap_or(RouteAccess::Protected(None))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Route table for the routes mounted by [`crate::app::build_app`].
pub fn default_route_table() -> RouteTable {
    use CrudAction::{Delete, Read, Update};
    use ManagedTable::{AuditLogs, UserPermissions, Users};

    RouteTable::new()
        .public(Method::GET, "/health")
        .authenticated(Method::GET, "/health/auth")
        .authenticated(Method::GET, "/whoami")
        .require(
            Method::GET,
            "/permissions/me",
            PermissionRequirement::new(Users, Read).scoped(PermissionScope::Own),
        )
        .require(
            Method::GET,
            "/permissions/tables",
            PermissionRequirement::new(Users, Read).scoped(PermissionScope::All),
        )
        .require(Method::GET, "/permissions/user/:id", PermissionRequirement::new(Users, Read))
        .require(
            Method::PATCH,
            "/permissions/user/:id",
            PermissionRequirement::new(Users, Update).scoped(PermissionScope::All),
        )
        .require(
            Method::PUT,
            "/permissions/user/:id/:table",
            PermissionRequirement::new(UserPermissions, Update).scoped(PermissionScope::All),
        )
        .require(
            Method::DELETE,
            "/permissions/user/:id/:table",
            PermissionRequirement::new(UserPermissions, Delete).scoped(PermissionScope::All),
        )
        .require(
            Method::GET,
            "/audit-logs",
            PermissionRequirement::new(AuditLogs, Read).scoped(PermissionScope::All),
        )
        .require(Method::GET, "/audit-logs/user/:id", PermissionRequirement::new(AuditLogs, Read))
}
