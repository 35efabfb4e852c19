use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stratum_core::{RoleId, TenantId, UserId};

/// Raw JWT claims as they appear on the wire.
///
/// Every field is optional here so that a structurally valid token with a
/// missing claim surfaces as [`TokenError::InvalidPayload`] rather than as a
/// decoding failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl TokenClaims {
    /// Claims for a principal, valid from `issued_at` until `expires_at`.
    pub fn for_user(
        user_id: UserId,
        tenant_id: TenantId,
        role_id: RoleId,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: Some(user_id.to_string()),
            tenant_id: Some(tenant_id.to_string()),
            role_id: Some(role_id.to_string()),
            iat: Some(issued_at.timestamp()),
            exp: Some(expires_at.timestamp()),
        }
    }
}

/// Claims after signature, expiry and payload checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    pub sub: UserId,
    pub tenant_id: TenantId,
    pub role_id: RoleId,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid token payload: {0}")]
    InvalidPayload(&'static str),
}

/// Signature + claims verification boundary.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedClaims, TokenError>;
}

/// HMAC-SHA256 verifier over a shared secret.
pub struct Hs256TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256TokenVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock in `validate_claims`.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl core::fmt::Debug for Hs256TokenVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256TokenVerifier").finish_non_exhaustive()
    }
}

impl TokenVerifier for Hs256TokenVerifier {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedClaims, TokenError> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::MissingRequiredClaim(_) => TokenError::InvalidPayload("exp"),
                other => TokenError::Malformed(format!("{other:?}")),
            })?;
        validate_claims(&data.claims, now)
    }
}

/// Deterministically validate decoded claims.
///
/// Note: this validates the *claims* only. Signature verification happens in
/// the [`TokenVerifier`] before this is called.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<VerifiedClaims, TokenError> {
    let exp = claims.exp.ok_or(TokenError::InvalidPayload("exp"))?;
    let expires_at = Utc
        .timestamp_opt(exp, 0)
        .single()
        .ok_or(TokenError::InvalidPayload("exp"))?;
    if now >= expires_at {
        return Err(TokenError::Expired);
    }

    let sub = required(&claims.sub, "sub")?;
    let tenant_id = required(&claims.tenant_id, "tenantId")?;
    let role_id = required(&claims.role_id, "roleId")?;

    Ok(VerifiedClaims {
        sub: sub.parse().map_err(|_| TokenError::InvalidPayload("sub"))?,
        tenant_id: tenant_id.parse().map_err(|_| TokenError::InvalidPayload("tenantId"))?,
        role_id: role_id.parse().map_err(|_| TokenError::InvalidPayload("roleId"))?,
        expires_at,
    })
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, TokenError> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(TokenError::InvalidPayload(name)),
    }
}

/// Sign claims with HS256 (token issuance for tooling and tests).
pub fn encode_token(secret: &[u8], claims: &TokenClaims) -> Result<String, TokenError> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| TokenError::Malformed(e.to_string()))
}
