use axum::{extract::Extension, response::IntoResponse, Json};
use serde_json::json;

use stratum_auth::Principal;

use crate::app::AppState;
use crate::app::dto::AuthStatusResponse;

/// GET /health - public; database state is served from a 30 s cache.
pub async fn health(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let database = state.health.check().await;
    let status = if database.healthy { "ok" } else { "degraded" };
    Json(json!({
        "status": status,
        "database": database,
    }))
}

/// GET /health/auth - confirms the caller's credentials resolve.
pub async fn auth_status(
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
) -> Json<AuthStatusResponse> {
    Json(AuthStatusResponse {
        authenticated: true,
        strategy: state.strategy_name,
        user: principal,
    })
}

pub async fn whoami(Extension(principal): Extension<Principal>) -> Json<Principal> {
    Json(principal)
}
