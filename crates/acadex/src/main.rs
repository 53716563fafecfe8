//! `acadex-server`: the service with the in-memory store.

use std::sync::Arc;

use acadex::config::AppConfig;
use acadex::{AcadexServerBuilder, init_tracing};
use acadex_session::MemoryStore;
use acadex_timetable::MemoryTimetable;
use anyhow::Context;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.logging)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting acadex-server");

    let auth = config.auth.static_authenticator();
    if auth.is_empty() {
        tracing::warn!("no auth tokens configured, every bearer token will be rejected");
    }

    let server = AcadexServerBuilder::new()
        .config(config)
        .build(
            Arc::new(MemoryStore::new()),
            auth,
            Arc::new(MemoryTimetable::new()),
        )
        .await
        .context("failed to start server")?;

    tracing::info!(
        http = %server.http_addr()?,
        feed = %server.feed_addr()?,
        "listening"
    );

    server.run_until(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
