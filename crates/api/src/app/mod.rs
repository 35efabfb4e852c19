//! HTTP API application wiring (Axum router + collaborators).
//!
//! - `services.rs`: builds collaborators (stores, strategy) from config
//! - `routes/`: HTTP handlers, one file per area
//! - `route_table.rs`: public / permission metadata per route, read by the guard
//! - `exception.rs`: the terminal error + audit pipeline
//! - `errors.rs`: error taxonomy and classification
//! - `dto.rs`: request/response bodies

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, HeaderValue, Method, Uri},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use stratum_audit::AuditStore;
use stratum_auth::{AccountDirectory, AuthStrategy, AuthorizationEngine, PermissionStore};
use stratum_core::{Clock, Environment, IdGenerator};
use stratum_infra::DatabaseHealth;

use crate::middleware::{self, GuardState, REQUEST_ID_HEADER};

pub mod dto;
pub mod errors;
pub mod exception;
pub mod route_table;
pub mod routes;
pub mod services;

use errors::ApiError;
use exception::ExceptionState;

/// Authorization engine over whichever permission store is configured.
pub type Engine = AuthorizationEngine<Arc<dyn PermissionStore>>;

/// Explicit collaborators for [`build_app`].
pub struct AppDeps {
    pub environment: Environment,
    pub strategy: Arc<dyn AuthStrategy>,
    pub permissions: Arc<dyn PermissionStore>,
    pub directory: Arc<dyn AccountDirectory>,
    pub audit: Arc<dyn AuditStore>,
    pub health: Arc<DatabaseHealth>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub cors_origins: Vec<String>,
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub directory: Arc<dyn AccountDirectory>,
    pub audit: Arc<dyn AuditStore>,
    pub health: Arc<DatabaseHealth>,
    pub strategy_name: &'static str,
}

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
///
/// Layers, outermost first: trace, CORS, request id, exception pipeline,
/// panic catcher, then the guard on matched routes only.
pub fn build_app(deps: AppDeps) -> Router {
    let engine = Arc::new(AuthorizationEngine::new(deps.permissions));

    let state = AppState {
        engine: engine.clone(),
        directory: deps.directory,
        audit: deps.audit.clone(),
        health: deps.health,
        strategy_name: deps.strategy.name(),
    };
    let guard_state = GuardState {
        strategy: deps.strategy,
        engine,
        routes: Arc::new(route_table::default_route_table()),
    };
    let exception_state = ExceptionState {
        environment: deps.environment,
        audit: deps.audit,
        clock: deps.clock,
    };

    routes::router()
        .route_layer(axum::middleware::from_fn_with_state(guard_state, middleware::guard))
        .fallback(not_found)
        .layer(Extension(state))
        .layer(CatchPanicLayer::custom(exception::panic_response))
        .layer(axum::middleware::from_fn_with_state(
            exception_state,
            exception::security_exception_pipeline,
        ))
        .layer(axum::middleware::from_fn_with_state(
            deps.ids,
            middleware::request_id_middleware,
        ))
        .layer(cors_layer(deps.environment, &deps.cors_origins))
        .layer(TraceLayer::new_for_http())
}

async fn not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::not_found(format!("Cannot {} {}", method, uri.path()))
}

/// Permissive outside production; an explicit origin allow-list in production.
fn cors_layer(environment: Environment, origins: &[String]) -> CorsLayer {
    if !environment.is_production() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| tracing::warn!(%origin, "ignoring invalid CORS origin"))
                .ok()
        })
        .collect();
    if origins.is_empty() {
        tracing::warn!("no CORS origins configured; cross-origin requests will be rejected");
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, REQUEST_ID_HEADER])
        .expose_headers([REQUEST_ID_HEADER])
        .allow_credentials(true)
}
