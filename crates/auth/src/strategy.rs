//! Pluggable authentication strategies.

use async_trait::async_trait;
use thiserror::Error;

use stratum_core::{Environment, StoreError};

use crate::Principal;

/// The parts of an inbound request a strategy may look at.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthRequest<'a> {
    /// Raw `Authorization` header value, if present.
    pub authorization: Option<&'a str>,
}

impl<'a> AuthRequest<'a> {
    pub fn new(authorization: Option<&'a str>) -> Self {
        Self { authorization }
    }

    /// Extract the token from an `Authorization: Bearer <token>` header.
    ///
    /// Anything other than that exact shape fails before any verification runs.
    pub fn bearer_token(&self) -> Result<&'a str, AuthError> {
        let header = self.authorization.ok_or(AuthError::MissingCredentials)?;
        let token = header.strip_prefix("Bearer ").ok_or(AuthError::MalformedHeader)?;
        if token.is_empty() || token.contains(char::is_whitespace) {
            return Err(AuthError::MalformedHeader);
        }
        Ok(token)
    }
}

/// Why authentication failed.
///
/// Variants are distinguishable for diagnostics; callers surface all of them
/// (except [`AuthError::Directory`]) as the same generic "unauthorized" outcome.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing authentication token")]
    MissingCredentials,

    #[error("invalid authorization header format (expected: Bearer <token>)")]
    MalformedHeader,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token")]
    InvalidToken,

    #[error("invalid token payload: missing or malformed '{0}'")]
    InvalidPayload(&'static str),

    #[error("user not found")]
    UserNotFound,

    #[error("user account is deactivated")]
    UserInactive,

    #[error("tenant not found")]
    TenantNotFound,

    #[error("tenant is inactive")]
    TenantInactive,

    #[error("bypass authentication is not available in {0}")]
    BypassUnavailable(Environment),

    /// The account lookup itself failed; this is an infrastructure error,
    /// not a credential problem.
    #[error("account lookup failed: {0}")]
    Directory(StoreError),
}

impl AuthError {
    /// Stable label for structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::MalformedHeader => "malformed_header",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidToken => "invalid_token",
            AuthError::InvalidPayload(_) => "invalid_payload",
            AuthError::UserNotFound => "user_not_found",
            AuthError::UserInactive => "user_inactive",
            AuthError::TenantNotFound => "tenant_not_found",
            AuthError::TenantInactive => "tenant_inactive",
            AuthError::BypassUnavailable(_) => "bypass_unavailable",
            AuthError::Directory(_) => "directory_failure",
        }
    }
}

/// Resolves a raw request into an authenticated principal.
///
/// A failure is final for the request; nothing retries it.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn authenticate(&self, request: &AuthRequest<'_>) -> Result<Principal, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bearer_token() {
        let req = AuthRequest::new(Some("Bearer abc.def.ghi"));
        assert_eq!(req.bearer_token().unwrap(), "abc.def.ghi");
    }

    #[test]
    fn missing_header() {
        assert_eq!(
            AuthRequest::new(None).bearer_token().unwrap_err(),
            AuthError::MissingCredentials
        );
    }

    #[test]
    fn rejects_other_shapes() {
        for header in ["Token xyz", "bearer xyz", "Bearer", "Bearer ", "Bearer a b", "Bearer  xyz", "Bearer xyz ", "Bearer\txyz", "Basic dXNlcjpwdw==", "xyz"] {
            assert_eq!(
                AuthRequest::new(Some(header)).bearer_token().unwrap_err(),
                AuthError::MalformedHeader,
                "{header:?}"
            );
        }
    }
}
