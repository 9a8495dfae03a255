//! MyBlog server binary.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use myblog_core::auth::TokenService;
use myblog_core::db::registry;
use myblog_core::{BootstrapOptions, Database};
use myblog_server::{logging, router, AppState, ServerConfig};

const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);
const POOL_REAP_INTERVAL: Duration = Duration::from_secs(60);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    logging::init(&config.log_level, &config.db.log_level);
    config.validate()?;
    tracing::debug!(?config, "configuration loaded");

    if !config.kafka_brokers.is_empty() {
        tracing::info!(
            brokers = ?config.kafka_brokers,
            group_id = %config.kafka_group_id,
            "message bus configured; no consumer is started"
        );
    }

    let driver_config = config.db.to_driver_config();
    tracing::info!(
        drivers = ?registry::global().available(),
        driver = %driver_config.driver,
        "opening database"
    );
    let db = Database::open(registry::global(), &driver_config)
        .await
        .context("failed to open database")?;

    if driver_config.auto_migrate && !db.is_embedded() {
        tracing::warn!(
            backend = db.backend(),
            "schema bootstrap runs on the embedded engine only; skipping"
        );
    } else if driver_config.auto_migrate {
        db.bootstrap(BootstrapOptions {
            markdown_dir: Some(config.markdown_dir.clone()),
            seed_admin: true,
        })
        .await
        .context("database bootstrap failed")?;
    }

    let tokens = match &config.jwt_secret {
        Some(secret) => TokenService::with_secret(secret.clone()),
        None => {
            tracing::warn!("JWT_SECRET not set; tokens will not survive a restart");
            TokenService::new()?
        }
    };

    let state = AppState::new(db, tokens, config.static_dir.clone());
    spawn_maintenance(&state);

    let app = router(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    match config.tls_files() {
        Some((cert, key)) => {
            let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert, &key)
                .await
                .with_context(|| {
                    format!("failed to load TLS files {} / {}", cert.display(), key.display())
                })?;
            let handle = axum_server::Handle::new();
            let shutdown = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown.graceful_shutdown(Some(SHUTDOWN_GRACE));
            });
            tracing::info!("listening on https://{}", addr);
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {}", addr))?;
            tracing::info!("listening on http://{}", addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    state.db.close().await;
    Ok(())
}

fn spawn_maintenance(state: &AppState) {
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match sessions.cleanup_expired() {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(
                    removed,
                    remaining = sessions.len(),
                    "expired ECC sessions removed"
                ),
                Err(e) => tracing::warn!(error = %e, "ECC session cleanup failed"),
            }
        }
    });

    let db = state.db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(POOL_REAP_INTERVAL);
        loop {
            interval.tick().await;
            let closed = db.reap_idle();
            if closed > 0 {
                tracing::debug!(closed, "idle database connections closed");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
