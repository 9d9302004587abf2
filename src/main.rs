use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod config;
mod dashboard;
mod db;
mod error;
mod matches;
mod scoreboard;

use config::Config;
use dashboard::AppState;
use db::{SqliteBackend, Store};
use matches::{start_poller, FootballData, MatchProvider, Normalizer};
use scoreboard::Scoreboard;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Open the snapshot/favorites store
    let backend = SqliteBackend::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path))?;
    info!("Database opened: {}", config.database_path);
    let store = Store::new(backend);

    let normalizer = match config.label_offset() {
        Some(offset) => Normalizer::with_offset(offset),
        None => Normalizer::local(),
    };

    let board = Arc::new(Scoreboard::new(
        store,
        normalizer,
        config.initial_view,
        !config.offline,
    ));

    let poller = if config.offline {
        info!("Offline mode – serving the cached snapshot only");
        None
    } else {
        let provider: Arc<dyn MatchProvider> = Arc::new(
            FootballData::new(config.api_key.as_deref(), Some(&config.api_url))?
                .with_window(config.days_back, config.days_ahead),
        );
        Some(start_poller(
            board.clone(),
            provider,
            Duration::from_secs(config.poll_interval_secs),
        ))
    };

    // Start the dashboard HTTP server
    let app = dashboard::router(AppState {
        board,
        polling: poller.is_some(),
    });
    let addr: SocketAddr = config.dashboard_addr.parse()?;
    info!("Dashboard listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run dashboard server (blocks until Ctrl-C)
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(poller) = poller {
        poller.stop();
    }
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
