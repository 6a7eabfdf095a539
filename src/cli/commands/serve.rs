//! Implementation of the `phoenix-board serve` command.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::adapters::http::BoardHttpServer;
use crate::adapters::memory::InMemoryCounterStore;
use crate::adapters::sqlite::{initialize_counter_database, initialize_database, SqliteBoardStore, SqliteCounterStore};
use crate::cli::types::ServeArgs;
use crate::domain::models::{Config, CounterBackend};
use crate::domain::ports::CounterStore;
use crate::services::{BoardCoordinator, RateLimiter};

/// Wire the stores and services, then serve until shutdown.
pub async fn execute(args: ServeArgs, mut config: Config) -> Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let pool = initialize_database(&config.database)
        .await
        .with_context(|| format!("Failed to open board database {}", config.database.path))?;
    tracing::info!(path = %config.database.path, "board database ready");

    let counters = open_counter_store(&config).await?;
    let limiter = RateLimiter::new(counters, &config.rate_limit, &config.counter_store);
    let coordinator = BoardCoordinator::from_config(Arc::new(SqliteBoardStore::new(pool.clone())), limiter, &config);

    BoardHttpServer::new(coordinator, config.server.clone())
        .serve_with_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server failed: {e}"))?;

    pool.close().await;
    tracing::info!("task board stopped");
    Ok(())
}

/// Open the configured counter store and start its expiry sweeper.
async fn open_counter_store(config: &Config) -> Result<Arc<dyn CounterStore>> {
    let every = Duration::from_secs(config.rate_limit.window_secs);

    match config.counter_store.backend {
        CounterBackend::Memory => {
            let store = InMemoryCounterStore::new();
            let sweeper = store.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                loop {
                    ticker.tick().await;
                    let removed = sweeper.sweep().await;
                    tracing::trace!(removed, "swept expired rate counters");
                }
            });
            Ok(Arc::new(store))
        }
        CounterBackend::Sqlite => {
            let path = &config.counter_store.path;
            let pool = initialize_counter_database(path)
                .await
                .with_context(|| format!("Failed to open counter database {path}"))?;
            let store = SqliteCounterStore::new(pool);
            let sweeper = store.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                loop {
                    ticker.tick().await;
                    if let Err(err) = sweeper.purge_expired().await {
                        tracing::warn!(error = %err, "failed to purge expired rate counters");
                    }
                }
            });
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
