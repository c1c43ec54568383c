//! HTTP server initialization and runtime setup.
//!
//! Selects the storage backend, starts the background workers, serves the
//! router and tears everything down in order on Ctrl-C.

use crate::application::services::{IdentityService, ShortenerService};
use crate::config::Config;
use crate::domain::audit_worker::AuditWorker;
use crate::domain::deletion_worker::DeletionWorker;
use crate::domain::repositories::{AuditSink, UrlStore};
use crate::infrastructure::audit::{EndpointAuditSink, FileAuditSink};
use crate::infrastructure::persistence::{PgUrlStore, VolatileStore};
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use std::sync::Arc;
use std::time::Duration;

/// Opens the configured storage backend.
///
/// PostgreSQL when a DSN is set (migrations are applied), otherwise the
/// in-memory store replayed from its cold log.
pub async fn open_store(config: &Config) -> Result<Arc<dyn UrlStore>> {
    match config.database_dsn {
        Some(ref dsn) => {
            let store = PgUrlStore::connect(
                dsn,
                config.db_max_connections,
                Duration::from_secs(config.db_connect_timeout),
                config.key_store(),
            )
            .await
            .context("Failed to connect to PostgreSQL")?;
            store.migrate().await.context("Failed to migrate")?;
            Ok(Arc::new(store))
        }
        None => {
            let store = VolatileStore::open(&config.file_storage_path, config.key_store())
                .with_context(|| {
                    format!("Failed to open storage log {}", config.file_storage_path)
                })?;
            tracing::info!(
                "In-memory store ready with {} record(s)",
                store.len().await
            );
            Ok(Arc::new(store))
        }
    }
}

/// Builds the audit sinks enabled by configuration.
pub fn audit_sinks(config: &Config) -> Result<Vec<Arc<dyn AuditSink>>> {
    let mut sinks: Vec<Arc<dyn AuditSink>> = Vec::new();

    if let Some(ref path) = config.audit_file {
        let sink = FileAuditSink::open(path)
            .with_context(|| format!("Failed to open audit file {path}"))?;
        sinks.push(Arc::new(sink));
        tracing::info!("Audit file sink enabled: {}", path);
    }

    if let Some(ref url) = config.audit_url {
        sinks.push(Arc::new(EndpointAuditSink::new(url.clone())));
        tracing::info!("Audit endpoint sink enabled: {}", url);
    }

    if sinks.is_empty() {
        tracing::info!("No audit sinks configured");
    }

    Ok(sinks)
}

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - Storage backend (PostgreSQL or in-memory)
/// - Audit workers and deletion worker
/// - Axum HTTP server with graceful shutdown
///
/// # Errors
///
/// Returns an error if:
/// - The storage backend cannot be opened
/// - An audit sink cannot be created
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let store = open_store(&config).await?;

    let audit = AuditWorker::start(audit_sinks(&config)?, config.audit_worker());
    let deletion = DeletionWorker::start(store.clone(), config.deletion_worker());

    let shortener = Arc::new(ShortenerService::new(
        store.clone(),
        deletion.queue(),
        &config.base_url,
    ));
    let identity = Arc::new(IdentityService::new(
        &config.user_token_secret,
        config.user_token_ttl_seconds,
    ));
    let state = AppState::new(shortener, identity, audit.queue());

    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server_address))?;
    tracing::info!("Listening on http://{}", config.server_address);

    let served = axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    tracing::info!("HTTP server stopped");

    audit.shutdown().await;
    deletion.shutdown().await;
    store.shutdown().await;

    served.context("HTTP server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
