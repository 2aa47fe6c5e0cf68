//! # Hearth API Server
//!
//! REST API of the household pet and chore tracker.
//!
//! ## Startup
//!
//! 1. Load configuration from the environment (`.env` honoured)
//! 2. Connect to PostgreSQL and apply migrations
//! 3. Create the bootstrap administrator, if configured
//! 4. Serve until Ctrl-C, then drain in-flight requests
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p hearth-api
//! ```

use anyhow::Context;
use hearth_api::{
    app::{build_router, AppState},
    bootstrap::ensure_admin,
    config::Config,
};
use hearth_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, DatabaseConfig},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hearth_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Hearth API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = create_pool(DatabaseConfig::new(
        config.database.url.clone(),
        config.database.max_connections,
    ))
    .await
    .context("Failed to connect to the database")?;

    run_migrations(&pool).await.context("Failed to run migrations")?;

    if let Some(admin) = &config.admin {
        let outcome = ensure_admin(&pool, admin).await?;
        tracing::debug!(?outcome, "Administrator bootstrap finished");
    }

    tokio::fs::create_dir_all(&config.storage.files_path)
        .await
        .with_context(|| format!("Failed to create {}", config.storage.files_path.display()))?;

    let bind_address = config.bind_address();
    let state = AppState::new(pool.clone(), config).context("Invalid CRYPTO_SECRET")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
