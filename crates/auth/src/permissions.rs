use core::str::FromStr;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stratum_core::UserId;

use crate::registry::ManagedTable;

/// CRUD action a permission row can grant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrudAction {
    Create,
    Read,
    Update,
    Delete,
}

impl CrudAction {
    pub const ALL: [CrudAction; 4] = [
        CrudAction::Create,
        CrudAction::Read,
        CrudAction::Update,
        CrudAction::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CrudAction::Create => "create",
            CrudAction::Read => "read",
            CrudAction::Update => "update",
            CrudAction::Delete => "delete",
        }
    }
}

impl core::fmt::Display for CrudAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrudAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(CrudAction::Create),
            "read" => Ok(CrudAction::Read),
            "update" => Ok(CrudAction::Update),
            "delete" => Ok(CrudAction::Delete),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

/// Breadth of rows a principal may act on for one resource.
///
/// Ordered `None < Own < All`: a wider scope implies every narrower one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PermissionScope {
    #[default]
    None,
    Own,
    All,
}

impl PermissionScope {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionScope::None => "NONE",
            PermissionScope::Own => "OWN",
            PermissionScope::All => "ALL",
        }
    }

    /// Whether a granted scope meets a table-level requirement.
    ///
    /// - `ALL` is met only by `ALL`.
    /// - `OWN` is met by `OWN` or `ALL`.
    /// - no requirement (or a `NONE` requirement) is met by any scope except `NONE`.
    pub fn satisfies(self, required: Option<PermissionScope>) -> bool {
        match required {
            Some(PermissionScope::All) => self == PermissionScope::All,
            Some(PermissionScope::Own) | Some(PermissionScope::None) | None => {
                self != PermissionScope::None
            }
        }
    }
}

impl core::fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(PermissionScope::None),
            "OWN" => Ok(PermissionScope::Own),
            "ALL" => Ok(PermissionScope::All),
            other => Err(format!("unknown scope '{other}'")),
        }
    }
}

/// Permission row for one (principal, resource) pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePermission {
    pub can_create: bool,
    pub can_read: bool,
    pub can_update: bool,
    pub can_delete: bool,
    pub scope: PermissionScope,
}

impl TablePermission {
    /// Every CRUD flag set, with the given scope.
    pub fn full(scope: PermissionScope) -> Self {
        Self {
            can_create: true,
            can_read: true,
            can_update: true,
            can_delete: true,
            scope,
        }
    }

    pub fn allows_action(&self, action: CrudAction) -> bool {
        match action {
            CrudAction::Create => self.can_create,
            CrudAction::Read => self.can_read,
            CrudAction::Update => self.can_update,
            CrudAction::Delete => self.can_delete,
        }
    }

    /// Table-level decision: CRUD flag, then scope requirement.
    pub fn permits(&self, action: CrudAction, required: Option<PermissionScope>) -> bool {
        self.allows_action(action) && self.scope.satisfies(required)
    }

    /// Row-level decision for a record owned by `owner`.
    pub fn permits_record(&self, action: CrudAction, actor: UserId, owner: UserId) -> bool {
        if !self.allows_action(action) {
            return false;
        }
        match self.scope {
            PermissionScope::All => true,
            PermissionScope::Own => actor == owner,
            PermissionScope::None => false,
        }
    }

    /// Apply a partial update; unset fields keep their current value.
    pub fn patched(self, patch: &PermissionPatch) -> Self {
        Self {
            can_create: patch.can_create.unwrap_or(self.can_create),
            can_read: patch.can_read.unwrap_or(self.can_read),
            can_update: patch.can_update.unwrap_or(self.can_update),
            can_delete: patch.can_delete.unwrap_or(self.can_delete),
            scope: patch.scope.unwrap_or(self.scope),
        }
    }
}

/// Partial update for a single grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionPatch {
    pub can_create: Option<bool>,
    pub can_read: Option<bool>,
    pub can_update: Option<bool>,
    pub can_delete: Option<bool>,
    pub scope: Option<PermissionScope>,
}

/// One entry of an authoritative permission list (full-replace input).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrant {
    pub table_name: String,
    #[serde(flatten)]
    pub permission: TablePermission,
}

impl PermissionGrant {
    pub fn new(table_name: impl Into<String>, permission: TablePermission) -> Self {
        Self {
            table_name: table_name.into(),
            permission,
        }
    }
}

/// Mapping from resource name to permission row for one principal.
///
/// Keys are unique; iteration order is by name and carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeMap<String, TablePermission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, resource: &str) -> Option<&TablePermission> {
        self.0.get(resource)
    }

    pub fn insert(&mut self, resource: impl Into<String>, permission: TablePermission) {
        self.0.insert(resource.into(), permission);
    }

    pub fn contains(&self, resource: &str) -> bool {
        self.0.contains_key(resource)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TablePermission)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, TablePermission)> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = (String, TablePermission)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Declarative requirement attached to a route: "principal must be able to do
/// `action` on `resource` (at least at `scope`)".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionRequirement {
    pub resource: ManagedTable,
    pub action: CrudAction,
    pub scope: Option<PermissionScope>,
}

impl PermissionRequirement {
    pub fn new(resource: ManagedTable, action: CrudAction) -> Self {
        Self {
            resource,
            action,
            scope: None,
        }
    }

    pub fn scoped(mut self, scope: PermissionScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

impl core::fmt::Display for PermissionRequirement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.resource, self.action)?;
        if let Some(scope) = self.scope {
            write!(f, "@{scope}")?;
        }
        Ok(())
    }
}
