use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use stratum_auth::{AuthError, AuthRequest, AuthStrategy};
use stratum_core::IdGenerator;

use crate::app::errors::ApiError;
use crate::app::route_table::{RouteAccess, RouteTable};
use crate::app::Engine;
use crate::authz;
use crate::context::RequestContext;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
pub const CORRELATION_ID_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

/// Upper bound on an inbound correlation id we are willing to echo.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Outermost middleware: resolve the correlation id, expose it to inner
/// layers via [`RequestContext`], and echo it on every response.
pub async fn request_id_middleware(
    State(ids): State<Arc<dyn IdGenerator>>,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = inbound_request_id(req.headers()).unwrap_or_else(|| ids.generate());

    req.extensions_mut().insert(RequestContext::new(request_id.as_str()));
    let mut res = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

fn inbound_request_id(headers: &HeaderMap) -> Option<String> {
    [REQUEST_ID_HEADER, CORRELATION_ID_HEADER].iter().find_map(|name| {
        let value = headers.get(name)?.to_str().ok()?.trim();
        (!value.is_empty() && value.len() <= MAX_REQUEST_ID_LEN).then(|| value.to_string())
    })
}

#[derive(Clone)]
pub struct GuardState {
    pub strategy: Arc<dyn AuthStrategy>,
    pub engine: Arc<Engine>,
    pub routes: Arc<RouteTable>,
}

/// Per-route gate: public routes pass straight through; everything else is
/// authenticated by the configured strategy and then checked against the
/// route's permission requirement, if any.
pub async fn guard(State(state): State<GuardState>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let ctx = req.extensions().get::<RequestContext>().cloned();
    let request_id = ctx.as_ref().map(|c| c.request_id().to_string()).unwrap_or_default();

    let requirement = match state.routes.lookup(req.method(), &path) {
        RouteAccess::Public => {
            tracing::debug!(request_id = %request_id, route = %path, "public route");
            return Ok(next.run(req).await);
        }
        RouteAccess::Protected(requirement) => requirement,
    };

    let authorization = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default());

    let principal = match state.strategy.authenticate(&AuthRequest::new(authorization)).await {
        Ok(principal) => principal,
        Err(AuthError::Directory(e)) => {
            tracing::error!(request_id = %request_id, url = %req.uri(), error = %e, "account lookup failed");
            return Err(AuthError::Directory(e).into());
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                url = %req.uri(),
                strategy = state.strategy.name(),
                reason = e.reason(),
                "authentication failed"
            );
            return Err(e.into());
        }
    };

    if let Some(ctx) = &ctx {
        ctx.attach_principal(principal.clone());
    }

    if let Some(requirement) = requirement {
        authz::require(&state.engine, &principal, requirement).await?;
    }

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_prefers_x_request_id() {
        let mut headers = HeaderMap::new();
        headers.insert(CORRELATION_ID_HEADER, HeaderValue::from_static("corr-1"));
        assert_eq!(inbound_request_id(&headers).as_deref(), Some("corr-1"));

        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-1"));
        assert_eq!(inbound_request_id(&headers).as_deref(), Some("req-1"));
    }

    #[test]
    fn blank_or_oversized_ids_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("   "));
        assert_eq!(inbound_request_id(&headers), None);

        let long = "a".repeat(MAX_REQUEST_ID_LEN + 1);
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(&long).unwrap());
        assert_eq!(inbound_request_id(&headers), None);
    }
}
