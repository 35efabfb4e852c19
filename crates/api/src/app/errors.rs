//! HTTP error taxonomy and classification.
//!
//! Handlers and middleware return [`ApiError`]; nothing formats an error body
//! itself. `IntoResponse` only stamps the status and stashes the error in the
//! response extensions; the security exception pipeline
//! (`app::exception`) classifies, redacts, logs, audits and writes the body.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use stratum_audit::redact;
use stratum_auth::{AuthError, AuthzError, InvalidResource};
use stratum_core::{Environment, StoreError};

pub const DATABASE_UNAVAILABLE: &str = "DATABASE_UNAVAILABLE";
const DATABASE_UNAVAILABLE_MESSAGE: &str = "Database temporarily unavailable. Please try again later.";
const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    InvalidResource(#[from] InvalidResource),

    /// Every credential problem surfaces with the same message; the variant
    /// inside is for logs only.
    #[error("Unauthorized")]
    Unauthenticated(AuthError),

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Structured error with its own status (framework rejections, etc).
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),

    /// A handler panicked; carries the panic payload when it was a string.
    #[error("handler panicked")]
    Panic(String),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            // Lookup failures are infrastructure errors, not bad credentials.
            AuthError::Directory(store) => ApiError::Unexpected(anyhow::Error::new(store)),
            other => ApiError::Unauthenticated(other),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::InvalidResource(e) => ApiError::InvalidResource(e),
            AuthzError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Unexpected(anyhow::Error::new(err))
    }
}

/// Response extension carrying the error to the exception pipeline.
#[derive(Debug, Clone)]
pub struct Failure(pub Arc<ApiError>);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_hint();
        // Minimal body for when the pipeline is not installed (unit tests).
        let mut res = (
            status,
            Json(json!({ "success": false, "error": { "code": error_code(status) } })),
        )
            .into_response();
        res.extensions_mut().insert(Failure(Arc::new(self)));
        res
    }
}

impl ApiError {
    fn status_hint(&self) -> StatusCode {
        match self {
            ApiError::InvalidResource(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Http { status, .. } => *status,
            ApiError::Unexpected(e) if is_connectivity_error(e) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Unexpected(_) | ApiError::Panic(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Fixed client-facing code per status.
pub fn error_code(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "BAD_REQUEST",
        401 => "UNAUTHORIZED",
        403 => "FORBIDDEN",
        404 => "NOT_FOUND",
        409 => "CONFLICT",
        422 => "VALIDATION_ERROR",
        429 => "RATE_LIMIT_EXCEEDED",
        500 => "INTERNAL_SERVER_ERROR",
        503 => "SERVICE_UNAVAILABLE",
        _ => "UNKNOWN_ERROR",
    }
}

const CONNECTIVITY_SIGNATURES: [&str; 8] = [
    "pool_timeout",
    "pool timed out",
    "econnrefused",
    "etimedout",
    "connection timeout",
    "connection refused",
    "timed out",
    "timeout",
];

fn is_connectivity_code(code: &str) -> bool {
    (code.len() == 5 && code.starts_with("08")) || code == "57P03" || code == "P1001"
}

/// Whether an unclassified error looks like the data store being unreachable.
pub fn is_connectivity_error(err: &anyhow::Error) -> bool {
    let has_code = err.chain().any(|cause| {
        cause
            .downcast_ref::<StoreError>()
            .and_then(StoreError::code)
            .is_some_and(is_connectivity_code)
    });
    if has_code {
        return true;
    }

    let message = format!("{err:#}").to_ascii_lowercase();
    CONNECTIVITY_SIGNATURES.iter().any(|sig| message.contains(sig))
        || (message.contains("database") && message.contains("unavailable"))
}

/// Outcome of classifying an [`ApiError`] for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub status: StatusCode,
    pub code: &'static str,
    /// Client-facing message, already redacted.
    pub message: String,
    /// Error category for logs and audit rows.
    pub category: &'static str,
    /// Extra detail; only ever populated outside production.
    pub debug: Option<String>,
}

/// Classify an error. First match wins: structured errors keep their status
/// and message, connectivity failures become 503, anything else is a 500.
pub fn classify(err: &ApiError, environment: Environment) -> Classified {
    let production = environment.is_production();

    let (status, code, message, category, debug) = match err {
        ApiError::InvalidResource(_) => structured(StatusCode::BAD_REQUEST, err, "InvalidResource"),
        ApiError::Unauthenticated(_) => structured(StatusCode::UNAUTHORIZED, err, "Unauthenticated"),
        ApiError::Forbidden => structured(StatusCode::FORBIDDEN, err, "Forbidden"),
        ApiError::NotFound(_) => structured(StatusCode::NOT_FOUND, err, "NotFound"),
        ApiError::BadRequest(_) => structured(StatusCode::BAD_REQUEST, err, "BadRequest"),
        ApiError::Http { status, .. } => structured(*status, err, "HttpError"),
        ApiError::Unexpected(e) if is_connectivity_error(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            DATABASE_UNAVAILABLE,
            DATABASE_UNAVAILABLE_MESSAGE.to_string(),
            "DatabaseUnavailable",
            None,
        ),
        ApiError::Unexpected(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_code(StatusCode::INTERNAL_SERVER_ERROR),
            if production { INTERNAL_MESSAGE.to_string() } else { e.to_string() },
            "Internal",
            (!production).then(|| format!("{e:?}")),
        ),
        ApiError::Panic(payload) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_code(StatusCode::INTERNAL_SERVER_ERROR),
            INTERNAL_MESSAGE.to_string(),
            "Panic",
            (!production).then(|| format!("panic: {payload}")),
        ),
    };

    Classified {
        status,
        code,
        message: redact(&message),
        category,
        debug: debug.map(|d| redact(&d)),
    }
}

type Parts = (StatusCode, &'static str, String, &'static str, Option<String>);

fn structured(status: StatusCode, err: &ApiError, category: &'static str) -> Parts {
    (status, error_code(status), err.to_string(), category, None)
}
