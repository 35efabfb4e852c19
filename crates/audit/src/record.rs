use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stratum_core::{TenantId, UserId};

/// Entity id recorded when no principal was attached to the request.
pub const UNKNOWN_ACTOR: &str = "unknown";

/// What happened.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    Access,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::Login => "LOGIN",
            AuditAction::Logout => "LOGOUT",
            AuditAction::Access => "ACCESS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATE" => Some(AuditAction::Create),
            "UPDATE" => Some(AuditAction::Update),
            "DELETE" => Some(AuditAction::Delete),
            "LOGIN" => Some(AuditAction::Login),
            "LOGOUT" => Some(AuditAction::Logout),
            "ACCESS" => Some(AuditAction::Access),
            _ => None,
        }
    }
}

/// Kind of entity the event is about.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    User,
    Tenant,
    Role,
    AuditLog,
    UserPermission,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::User => "USER",
            EntityType::Tenant => "TENANT",
            EntityType::Role => "ROLE",
            EntityType::AuditLog => "AUDIT_LOG",
            EntityType::UserPermission => "USER_PERMISSION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(EntityType::User),
            "TENANT" => Some(EntityType::Tenant),
            "ROLE" => Some(EntityType::Role),
            "AUDIT_LOG" => Some(EntityType::AuditLog),
            "USER_PERMISSION" => Some(EntityType::UserPermission),
            _ => None,
        }
    }
}

/// Immutable audit entry.
///
/// `tenant_id`/`user_id` are empty for events raised before a principal was
/// resolved (e.g. a failed login).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: Uuid,
    pub tenant_id: Option<TenantId>,
    pub user_id: Option<UserId>,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub changes: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: String,
}
