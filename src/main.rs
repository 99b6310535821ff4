use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rosterd::config::Config;
use rosterd::http::{build_router, AppState};
use rosterd::store::{RecordStore, SqliteStore};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries only the startup line.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rosterd=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();

    let store = Arc::new(
        SqliteStore::open(&config.database_url)
            .with_context(|| format!("failed to open store at {}", config.database_url))?,
    );
    info!(database = %config.database_url, "store opened");

    let state = AppState::new(store.clone(), config.upload_dir.clone());
    let app = build_router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr()))?;
    let addr = listener.local_addr()?;

    // Supervisors read this line to learn the bound port.
    let mut stdout = std::io::stdout();
    writeln!(stdout, "{}", json!({ "listening": addr.to_string() }))?;
    stdout.flush()?;
    info!(%addr, upload_dir = %config.upload_dir.display(), "server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.close().context("failed to close store")?;
    info!("store closed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
