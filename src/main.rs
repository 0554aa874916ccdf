//! Ticket Validation Service - Main Application Entry Point
//!
//! This is a REST API server for validating event tickets. Scanner devices call
//! the validation endpoint with a ticket code; each ticket is accepted exactly
//! once and every attempt is recorded for auditing.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries), or an in-memory store
//! - **Format**: JSON responses, CSV uploads for bulk import
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool and run migrations (when `DATABASE_URL` is set)
//! 3. Build the redemption engine and statistics aggregator around the store
//! 4. Build HTTP router with routes and middleware
//! 5. Serve until Ctrl-C, then close the pool

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use ticket_validation_server::{
    config::Config,
    db::{self, DbPool},
    routes::create_router,
    state::AppState,
    store::PgStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        reimport_policy = ?config.reimport_policy,
        store_timeout_ms = config.store_timeout_ms,
        "Configuration loaded"
    );

    let (state, pool) = match &config.database_url {
        Some(database_url) => {
            let pool = db::create_pool(
                database_url,
                config.database_max_connections,
                config.database_timeout(),
            )
            .await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            let store = Arc::new(PgStore::new(pool.clone(), config.database_timeout()));
            (AppState::new(store.clone(), store, &config), Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            (AppState::in_memory(&config), None::<DbPool>)
        }
    };

    let app = create_router(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("Database pool closed");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
