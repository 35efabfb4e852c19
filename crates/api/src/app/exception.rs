//! Security exception pipeline.
//!
//! Terminal error handler for every request: anything that leaves the inner
//! service as an error response (handler errors, guard denials, framework
//! rejections, caught panics) is classified, redacted, logged, answered with
//! one JSON shape and, for 401/403/500, written to the audit log in the
//! background.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use uuid::Uuid;

use stratum_audit::{AuditAction, AuditRecord, AuditStore, EntityType, UNKNOWN_ACTOR};
use stratum_auth::Principal;
use stratum_core::{Clock, Environment};

use crate::app::errors::{ApiError, Classified, Failure, classify};
use crate::context::RequestContext;

const UNKNOWN: &str = "unknown";
const MAX_REJECTION_BODY: usize = 16 * 1024;

#[derive(Clone)]
pub struct ExceptionState {
    pub environment: Environment,
    pub audit: Arc<dyn AuditStore>,
    pub clock: Arc<dyn Clock>,
}

/// What we know about the request before the inner service consumes it.
#[derive(Debug, Clone)]
struct RequestMeta {
    method: Method,
    path: String,
    ip: String,
    user_agent: String,
    ctx: Option<RequestContext>,
}

impl RequestMeta {
    fn capture(req: &Request) -> Self {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Self {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            ip: client_ip(req.headers(), peer),
            user_agent: req
                .headers()
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .unwrap_or(UNKNOWN)
                .to_string(),
            ctx: req.extensions().get::<RequestContext>().cloned(),
        }
    }

    fn request_id(&self) -> &str {
        self.ctx.as_ref().map(RequestContext::request_id).unwrap_or_default()
    }

    fn principal(&self) -> Option<&Principal> {
        self.ctx.as_ref().and_then(RequestContext::principal)
    }
}

/// First `X-Forwarded-For` entry, else the socket peer, else `"unknown"`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => UNKNOWN.to_string(),
    }
}

pub async fn security_exception_pipeline(State(state): State<ExceptionState>, req: Request, next: Next) -> Response {
    let meta = RequestMeta::capture(&req);
    let res = next.run(req).await;

    let status = res.status();
    let failure = res.extensions().get::<Failure>().cloned();
    let error = match failure {
        Some(Failure(error)) => error,
        None if status.is_client_error() || status.is_server_error() => Arc::new(rejection_error(res).await),
        None => return res,
    };

    let classified = classify(&error, state.environment);
    let timestamp = state.clock.now();

    log_failure(&meta, &classified);

    if matches!(classified.status.as_u16(), 401 | 403 | 500) {
        let record = audit_record(&meta, &classified, timestamp);
        let audit = state.audit.clone();
        tokio::spawn(async move {
            if let Err(e) = audit.append(record).await {
                tracing::error!(error = %e, "failed to write security audit record");
            }
        });
    }

    error_response(&meta, &classified, timestamp)
}

/// An error response produced outside our handlers (e.g. an extractor
/// rejection): keep its status and use its plain-text body as the message.
async fn rejection_error(res: Response) -> ApiError {
    let status = res.status();
    let message = match axum::body::to_bytes(res.into_body(), MAX_REJECTION_BODY).await {
        Ok(bytes) if !bytes.is_empty() => String::from_utf8_lossy(&bytes).into_owned(),
        _ => status.canonical_reason().unwrap_or("Error").to_string(),
    };
    ApiError::Http { status, message }
}

fn log_failure(meta: &RequestMeta, classified: &Classified) {
    let user = meta
        .principal()
        .map(|p| p.id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());
    let line = format!(
        "{} {} | {} | {} | {} | {}",
        meta.method,
        meta.path,
        classified.status.as_u16(),
        meta.ip,
        user,
        classified.message
    );

    match classified.status.as_u16() {
        401 | 403 => tracing::warn!(
            request_id = %meta.request_id(),
            category = classified.category,
            "security exception: {line}"
        ),
        s if s >= 500 => tracing::error!(
            request_id = %meta.request_id(),
            category = classified.category,
            detail = classified.debug.as_deref().unwrap_or_default(),
            "{line}"
        ),
        _ => tracing::warn!(request_id = %meta.request_id(), category = classified.category, "{line}"),
    }
}

fn audit_record(meta: &RequestMeta, classified: &Classified, timestamp: DateTime<Utc>) -> AuditRecord {
    let principal = meta.principal();
    let action = if classified.status == StatusCode::UNAUTHORIZED {
        AuditAction::Login
    } else {
        AuditAction::Access
    };

    AuditRecord {
        id: Uuid::new_v4(),
        tenant_id: principal.map(|p| p.tenant_id),
        user_id: principal.map(|p| p.id),
        action,
        entity_type: EntityType::User,
        entity_id: principal
            .map(|p| p.id.to_string())
            .unwrap_or_else(|| UNKNOWN_ACTOR.to_string()),
        changes: json!({
            "status": classified.status.as_u16(),
            "path": meta.path,
            "method": meta.method.as_str(),
            "message": classified.message,
            "exceptionType": classified.category,
            "timestamp": rfc3339(timestamp),
        }),
        timestamp,
        ip_address: meta.ip.clone(),
        user_agent: meta.user_agent.clone(),
    }
}

fn error_response(meta: &RequestMeta, classified: &Classified, timestamp: DateTime<Utc>) -> Response {
    let mut error = json!({
        "code": classified.code,
        "message": classified.message,
        "timestamp": rfc3339(timestamp),
        "path": meta.path,
        "requestId": meta.request_id(),
    });
    if let Some(debug) = &classified.debug {
        error["debug"] = json!(debug);
    }

    (classified.status, Json(json!({ "success": false, "error": error }))).into_response()
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `CatchPanicLayer` hook: turn a panic payload into an [`ApiError::Panic`]
/// so the pipeline handles it like any other failure.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "non-string panic payload".to_string()
    };
    ApiError::Panic(detail).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;
    use tower_http::catch_panic::CatchPanicLayer;

    use stratum_audit::REDACTED_MESSAGE;
    use stratum_core::SystemClock;
    use stratum_infra::InMemoryAuditStore;

    #[test]
    fn ip_prefers_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();

        assert_eq!(client_ip(&headers, None), "unknown");
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.9");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7");
    }

    fn app(audit: Arc<InMemoryAuditStore>, environment: Environment) -> Router {
        let state = ExceptionState {
            environment,
            audit,
            clock: Arc::new(SystemClock),
        };
        Router::new()
            .route("/ok", get(|| async { "fine" }))
            .route("/forbidden", get(|| async { Err::<(), _>(ApiError::Forbidden) }))
            .route("/missing", get(|| async { Err::<(), _>(ApiError::not_found("User not found")) }))
            .route(
                "/secret",
                get(|| async { Err::<(), _>(ApiError::Unexpected(anyhow::anyhow!("bad password for admin"))) }),
            )
            .route(
                "/db",
                get(|| async { Err::<(), _>(ApiError::Unexpected(anyhow::anyhow!("ECONNREFUSED"))) }),
            )
            .route(
                "/panic",
                get(|| async {
                    if true {
                        panic!("boom");
                    }
                    "unreachable"
                }),
            )
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(axum::middleware::from_fn_with_state(state, security_exception_pipeline))
    }

    async fn call(app: Router, path: &str) -> (StatusCode, serde_json::Value) {
        let res = app
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    async fn wait_for_records(store: &InMemoryAuditStore, n: usize) -> Vec<AuditRecord> {
        for _ in 0..50 {
            let records = store.snapshot();
            if records.len() >= n {
                return records;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        store.snapshot()
    }

    #[tokio::test]
    async fn success_passes_through_untouched() {
        let audit = Arc::new(InMemoryAuditStore::new());
        let res = app(audit.clone(), Environment::Production)
            .oneshot(Request::builder().uri("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"fine");
    }

    #[tokio::test]
    async fn forbidden_is_shaped_and_audited_as_access() {
        let audit = Arc::new(InMemoryAuditStore::new());
        let (status, body) = call(app(audit.clone(), Environment::Production), "/forbidden").await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "FORBIDDEN");
        assert_eq!(body["error"]["path"], "/forbidden");
        assert!(body["error"].get("debug").is_none());

        let records = wait_for_records(&audit, 1).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, AuditAction::Access);
        assert_eq!(records[0].entity_type, EntityType::User);
        assert_eq!(records[0].entity_id, UNKNOWN_ACTOR);
        assert_eq!(records[0].ip_address, "unknown");
        assert_eq!(records[0].user_agent, "unknown");
        assert_eq!(records[0].changes["status"], 403);
        assert_eq!(records[0].changes["method"], "GET");
    }

    #[tokio::test]
    async fn not_found_is_never_audited() {
        let audit = Arc::new(InMemoryAuditStore::new());
        let (status, body) = call(app(audit.clone(), Environment::Production), "/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "User not found");

        let (status, body) = call(app(audit.clone(), Environment::Production), "/no-such-route").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(audit.snapshot().is_empty());
    }

    #[tokio::test]
    async fn sensitive_message_is_redacted_in_response_and_audit() {
        let audit = Arc::new(InMemoryAuditStore::new());
        let (status, body) = call(app(audit.clone(), Environment::Development), "/secret").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], REDACTED_MESSAGE);
        assert!(!body.to_string().contains("password"));

        let records = wait_for_records(&audit, 1).await;
        assert_eq!(records[0].changes["message"], REDACTED_MESSAGE);
        assert_eq!(records[0].action, AuditAction::Access);
    }

    #[tokio::test]
    async fn connectivity_failure_is_503_and_not_audited() {
        let audit = Arc::new(InMemoryAuditStore::new());
        let (status, body) = call(app(audit.clone(), Environment::Development), "/db").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "DATABASE_UNAVAILABLE");
        assert!(!body.to_string().contains("ECONNREFUSED"));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(audit.snapshot().is_empty());
    }

    #[tokio::test]
    async fn panics_become_generic_500s() {
        let audit = Arc::new(InMemoryAuditStore::new());
        let (status, body) = call(app(audit.clone(), Environment::Production), "/panic").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "Internal server error");
        assert!(body["error"].get("debug").is_none());
        assert_eq!(wait_for_records(&audit, 1).await.len(), 1);
    }
}
