use std::net::SocketAddr;

use anyhow::Context;
use stratum_api::{app, config::AppConfig};
use stratum_core::Environment;
use stratum_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    stratum_observability::init(log_format());

    let config = AppConfig::from_env().inspect_err(|e| tracing::error!(error = %e, "invalid configuration"))?;
    tracing::info!(?config, "starting");

    let deps = app::services::build_deps(&config).await?;
    let router = app::build_app(deps);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shut down");
    Ok(())
}

/// `LOG_FORMAT` wins; otherwise JSON in production and pretty elsewhere.
fn log_format() -> LogFormat {
    if let Some(format) = std::env::var("LOG_FORMAT").ok().and_then(|raw| raw.parse().ok()) {
        return format;
    }
    let environment = std::env::var("APP_ENV").ok().and_then(|raw| raw.parse::<Environment>().ok());
    match environment {
        Some(env) if env.is_production() => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
