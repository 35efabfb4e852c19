use std::{sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use stratum_auth::{
    AccountDirectory, AuthStrategy, BypassStrategy, Hs256TokenVerifier, ManagedTable, PermissionScope,
    PermissionStore, TablePermission, TenantAccount, TokenStrategy, UserAccount,
};
use stratum_core::{RoleId, SystemClock, TenantId, UserId, UuidGenerator};
use stratum_infra::{
    DatabaseHealth, InMemoryAccountDirectory, InMemoryAuditStore, InMemoryPermissionStore, PgHealthProbe,
    PostgresAccountDirectory, PostgresAuditStore, PostgresPermissionStore, StaticHealthProbe,
};

use super::AppDeps;
use crate::config::{AppConfig, AuthStrategyKind};

const POOL_MAX_CONNECTIONS: u32 = 10;
const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Build all collaborators for the configured environment.
///
/// With `DATABASE_URL` set every port is backed by Postgres; without it the
/// process runs on in-memory adapters (local development and demos).
pub async fn build_deps(config: &AppConfig) -> anyhow::Result<AppDeps> {
    let stores = match &config.database_url {
        Some(url) => postgres_stores(url)?,
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory stores (state is lost on restart)");
            in_memory_stores(config).await?
        }
    };

    let strategy = build_strategy(config, stores.directory.clone())?;
    tracing::info!(strategy = strategy.name(), environment = %config.environment, "authentication configured");

    Ok(AppDeps {
        environment: config.environment,
        strategy,
        permissions: stores.permissions,
        directory: stores.directory,
        audit: stores.audit,
        health: stores.health,
        clock: Arc::new(SystemClock),
        ids: Arc::new(UuidGenerator),
        cors_origins: config.cors_origins.clone(),
    })
}

struct Stores {
    permissions: Arc<dyn PermissionStore>,
    directory: Arc<dyn AccountDirectory>,
    audit: Arc<dyn stratum_audit::AuditStore>,
    health: Arc<DatabaseHealth>,
}

fn postgres_stores(database_url: &str) -> anyhow::Result<Stores> {
    // Connections open on first use; an unreachable database shows up in
    // /health and as 503s, not as a boot failure.
    let pool = PgPoolOptions::new()
        .max_connections(POOL_MAX_CONNECTIONS)
        .acquire_timeout(POOL_ACQUIRE_TIMEOUT)
        .connect_lazy(database_url)
        .context("invalid DATABASE_URL")?;

    tracing::info!(max_connections = POOL_MAX_CONNECTIONS, "postgres pool configured");

    Ok(Stores {
        permissions: Arc::new(PostgresPermissionStore::new(pool.clone())),
        directory: Arc::new(PostgresAccountDirectory::new(pool.clone())),
        audit: Arc::new(PostgresAuditStore::new(pool.clone())),
        health: Arc::new(DatabaseHealth::new(Arc::new(PgHealthProbe::new(pool)))),
    })
}

async fn in_memory_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    let permissions = Arc::new(InMemoryPermissionStore::new());
    let directory = Arc::new(InMemoryAccountDirectory::new());

    if config.environment.is_development() {
        if let Some(user_id) = config.dev_principal_id {
            seed_dev_principal(&directory, &permissions, user_id).await?;
        }
    }

    Ok(Stores {
        permissions,
        directory,
        audit: Arc::new(InMemoryAuditStore::new()),
        health: Arc::new(DatabaseHealth::new(Arc::new(StaticHealthProbe { healthy: true }))),
    })
}

/// Seed one active tenant and user with full `ALL` access to every table, so
/// a fresh in-memory process is usable with the bypass strategy.
async fn seed_dev_principal(
    directory: &InMemoryAccountDirectory,
    permissions: &InMemoryPermissionStore,
    user_id: UserId,
) -> anyhow::Result<()> {
    let tenant_id = TenantId::new();
    directory.insert_tenant(TenantAccount {
        id: tenant_id,
        name: "Development".to_string(),
        is_active: true,
    });
    directory.insert_user(UserAccount {
        id: user_id,
        email: "dev@localhost".to_string(),
        tenant_id,
        role_id: RoleId::new(),
        is_active: true,
    });

    for table in ManagedTable::ALL {
        permissions
            .upsert(user_id, table.table_name(), TablePermission::full(PermissionScope::All))
            .await
            .context("seeding development permissions")?;
    }

    tracing::info!(%user_id, %tenant_id, "seeded development principal");
    Ok(())
}

fn build_strategy(config: &AppConfig, directory: Arc<dyn AccountDirectory>) -> anyhow::Result<Arc<dyn AuthStrategy>> {
    match config.auth_strategy {
        AuthStrategyKind::Token => Ok(Arc::new(TokenStrategy::new(
            Arc::new(Hs256TokenVerifier::new(config.jwt_secret.as_bytes())),
            directory,
            Arc::new(SystemClock),
        ))),
        AuthStrategyKind::Bypass => {
            let principal_id = config
                .dev_principal_id
                .context("bypass authentication requires DEV_PRINCIPAL_ID")?;
            let strategy = BypassStrategy::new(config.environment, principal_id, directory)?;
            Ok(Arc::new(strategy))
        }
    }
}
