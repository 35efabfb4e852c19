use axum::{
    routing::{get, put},
    Router,
};

pub mod audit_logs;
pub mod permissions;
pub mod system;

/// Every route of the service. Access rules live in
/// [`crate::app::route_table::default_route_table`], keyed by these paths.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/health/auth", get(system::auth_status))
        .route("/whoami", get(system::whoami))
        .route("/permissions/me", get(permissions::me))
        .route("/permissions/tables", get(permissions::tables))
        .route(
            "/permissions/user/:id",
            get(permissions::for_user).patch(permissions::replace_for_user),
        )
        .route(
            "/permissions/user/:id/:table",
            put(permissions::grant).delete(permissions::revoke),
        )
        .route("/audit-logs", get(audit_logs::list))
        .route("/audit-logs/user/:id", get(audit_logs::for_user))
}
