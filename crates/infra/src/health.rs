//! Database health probing with a cached result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::Mutex;

use stratum_core::StoreResult;

use crate::pg::map_sqlx_error;

/// Round-trips to the backing store.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;
}

/// `SELECT 1` against the pool.
#[derive(Debug, Clone)]
pub struct PgHealthProbe {
    pool: PgPool,
}

impl PgHealthProbe {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthProbe for PgHealthProbe {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("health_check", e))?;
        Ok(())
    }
}

/// Probe for in-memory deployments; always reports the configured state.
#[derive(Debug, Clone, Copy)]
pub struct StaticHealthProbe {
    pub healthy: bool,
}

#[async_trait]
impl HealthProbe for StaticHealthProbe {
    async fn ping(&self) -> StoreResult<()> {
        if self.healthy {
            Ok(())
        } else {
            Err(stratum_core::StoreError::backend("database unavailable"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub healthy: bool,
    pub checked_at: DateTime<Utc>,
    pub latency_ms: u64,
    /// Whether this report came from the cache rather than a fresh probe.
    pub cached: bool,
}

/// Owns the last probe result and refreshes it at most once per `ttl`.
///
/// Concurrent callers during a refresh wait on the same lock, so only one
/// probe is in flight at a time. The probe error itself is logged, never
/// returned to callers.
pub struct DatabaseHealth {
    probe: Arc<dyn HealthProbe>,
    ttl: Duration,
    last: Mutex<Option<(Instant, HealthReport)>>,
}

impl DatabaseHealth {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

    pub fn new(probe: Arc<dyn HealthProbe>) -> Self {
        Self::with_ttl(probe, Self::DEFAULT_TTL)
    }

    pub fn with_ttl(probe: Arc<dyn HealthProbe>, ttl: Duration) -> Self {
        Self {
            probe,
            ttl,
            last: Mutex::new(None),
        }
    }

    pub async fn check(&self) -> HealthReport {
        let mut last = self.last.lock().await;

        if let Some((at, report)) = last.as_ref() {
            if at.elapsed() < self.ttl {
                return HealthReport {
                    cached: true,
                    ..report.clone()
                };
            }
        }

        let started = Instant::now();
        let healthy = match self.probe.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "database health check failed");
                false
            }
        };
        let report = HealthReport {
            healthy,
            checked_at: Utc::now(),
            latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            cached: false,
        };
        *last = Some((started, report.clone()));
        report
    }
}

impl core::fmt::Debug for DatabaseHealth {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DatabaseHealth").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}
