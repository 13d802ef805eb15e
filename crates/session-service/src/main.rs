//! Signing key rotator.
//!
//! Keeps the shared access token signing key fresh and purges retired keys,
//! so that service instances reading the same store always find a current
//! key.

use common::clock::SystemClock;
use session_service::config::Config;
use session_service::observability::metrics;
use session_service::repositories::PgSigningKeyStore;
use session_service::services::SigningKeyManager;
use session_service::tasks::start_key_rotation_task;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "session_service=info,signing_key_rotator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting signing key rotator");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Some(bind_address) = &config.metrics_bind_address {
        let addr: SocketAddr = bind_address.parse().map_err(|e| {
            error!("Invalid metrics bind address: {}", e);
            e
        })?;
        metrics::install_metrics_exporter(addr).map_err(|e| {
            error!("{}", e);
            e
        })?;
        info!("Metrics exporter listening on {}", addr);
    }

    info!("Connecting to database...");
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(config.require_database_url()?)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| {
            error!("Failed to run migrations: {}", e);
            e
        })?;

    info!("Database ready");

    let manager = Arc::new(SigningKeyManager::from_config(
        Arc::new(PgSigningKeyStore::new(db_pool)),
        Arc::new(SystemClock),
        &config,
    )?);

    // Fail fast on a corrupted or unreachable store.
    let key = manager.get_signing_key().await.map_err(|e| {
        error!("Failed to initialize signing key: {}", e);
        e
    })?;
    info!(key_version = key.version, "Signing key initialized");

    let cancel_token = CancellationToken::new();
    let task = tokio::spawn(start_key_rotation_task(
        manager,
        config.key_rotation_check_interval,
        cancel_token.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    cancel_token.cancel();
    task.await?;

    info!("Signing key rotator stopped");
    Ok(())
}
