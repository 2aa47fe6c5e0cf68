//! # Hearth Worker
//!
//! Runs the scheduled jobs of Hearth until Ctrl-C:
//!
//! - Regenerates recurring tasks whose date has passed
//! - Archives overdue tasks, downgrading the mood of neglected animals
//! - Purges expired join codes
//!
//! Several workers may run against the same database; rows are claimed with
//! `SKIP LOCKED`.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p hearth-worker
//! ```

use anyhow::Context;
use hearth_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use hearth_worker::{
    config::WorkerConfig,
    orchestrator::{OrchestratorConfig, WorkerOrchestrator},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hearth_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Hearth Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env().context("Failed to load configuration")?;

    let pool = create_pool(DatabaseConfig::new(
        config.database_url.clone(),
        config.max_connections,
    ))
    .await
    .context("Failed to connect to the database")?;

    let orchestrator = WorkerOrchestrator::new(
        pool.clone(),
        OrchestratorConfig {
            poll_interval_secs: config.poll_interval_secs,
            batch_size: config.batch_size,
        },
    );

    let shutdown = orchestrator.shutdown_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received, finishing current tick...");
        shutdown.cancel();
    });

    orchestrator.run().await;

    close_pool(pool).await;
    Ok(())
}
