//! Process configuration read from environment variables.

use std::net::SocketAddr;

use thiserror::Error;

use stratum_core::{Environment, UserId};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

/// Which authentication strategy guards non-public routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStrategyKind {
    #[default]
    Token,
    Bypass,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set in production")]
    MissingJwtSecret,

    #[error("AUTH_STRATEGY=bypass is not allowed in production")]
    BypassInProduction,

    #[error("DEV_PRINCIPAL_ID must be set when AUTH_STRATEGY=bypass")]
    MissingDevPrincipal,

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub auth_strategy: AuthStrategyKind,
    pub dev_principal_id: Option<UserId>,
    pub database_url: Option<String>,
    /// Allowed CORS origins; only enforced in production.
    pub cors_origins: Vec<String>,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("environment", &self.environment)
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field("auth_strategy", &self.auth_strategy)
            .field("dev_principal_id", &self.dev_principal_id)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = match var("APP_ENV") {
            Some(raw) => raw.parse().map_err(|e: stratum_core::environment::UnknownEnvironment| {
                ConfigError::Invalid {
                    key: "APP_ENV",
                    reason: e.to_string(),
                }
            })?,
            None => Environment::default(),
        };

        let mut bind_addr: SocketAddr = var("BIND_ADDR")
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "BIND_ADDR",
                reason: e.to_string(),
            })?;
        if let Some(port) = var("PORT") {
            let port: u16 = port.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                key: "PORT",
                reason: e.to_string(),
            })?;
            bind_addr.set_port(port);
        }

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if environment.is_production() => return Err(ConfigError::MissingJwtSecret),
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let auth_strategy = match var("AUTH_STRATEGY").as_deref() {
            None | Some("token") => AuthStrategyKind::Token,
            Some("bypass") => AuthStrategyKind::Bypass,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "AUTH_STRATEGY",
                    reason: format!("unknown strategy '{other}' (expected token or bypass)"),
                });
            }
        };

        let dev_principal_id = var("DEV_PRINCIPAL_ID")
            .map(|raw| {
                raw.parse::<UserId>().map_err(|e| ConfigError::Invalid {
                    key: "DEV_PRINCIPAL_ID",
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        if auth_strategy == AuthStrategyKind::Bypass {
            if environment.is_production() {
                return Err(ConfigError::BypassInProduction);
            }
            if dev_principal_id.is_none() {
                return Err(ConfigError::MissingDevPrincipal);
            }
        }

        let cors_origins = var("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            environment,
            bind_addr,
            jwt_secret,
            auth_strategy,
            dev_principal_id,
            database_url: var("DATABASE_URL"),
            cors_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_to_development_with_token_auth() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.auth_strategy, AuthStrategyKind::Token);
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn port_overrides_bind_port() {
        let cfg = config(&[("BIND_ADDR", "127.0.0.1:3000"), ("PORT", "9090")]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:9090");
    }

    #[test]
    fn production_requires_jwt_secret() {
        assert_eq!(config(&[("APP_ENV", "production")]).unwrap_err(), ConfigError::MissingJwtSecret);
    }

    #[test]
    fn bypass_is_rejected_in_production() {
        let err = config(&[
            ("APP_ENV", "production"),
            ("JWT_SECRET", "s3cr3t"),
            ("AUTH_STRATEGY", "bypass"),
            ("DEV_PRINCIPAL_ID", "0191d5a0-0000-7000-8000-000000000001"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::BypassInProduction);
    }

    #[test]
    fn bypass_needs_a_principal() {
        assert_eq!(
            config(&[("AUTH_STRATEGY", "bypass")]).unwrap_err(),
            ConfigError::MissingDevPrincipal
        );
        let cfg = config(&[
            ("AUTH_STRATEGY", "bypass"),
            ("DEV_PRINCIPAL_ID", "0191d5a0-0000-7000-8000-000000000001"),
        ])
        .unwrap();
        assert_eq!(cfg.auth_strategy, AuthStrategyKind::Bypass);
        assert!(cfg.dev_principal_id.is_some());
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let cfg = config(&[("CORS_ORIGINS", "https://a.example, https://b.example ,,")]).unwrap();
        assert_eq!(cfg.cors_origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn unknown_values_are_reported_by_key() {
        assert!(matches!(
            config(&[("AUTH_STRATEGY", "oauth")]),
            Err(ConfigError::Invalid { key: "AUTH_STRATEGY", .. })
        ));
        assert!(matches!(
            config(&[("APP_ENV", "staging")]),
            Err(ConfigError::Invalid { key: "APP_ENV", .. })
        ));
    }
}
