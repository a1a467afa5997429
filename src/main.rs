//! Application entry point for the `codemetal-plantwatch` service.
//!
//! This binary runs the startup sequence for the machine health monitoring
//! API:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool
//! - Creating the database schema if it does not exist
//! - Mounting all API routes via the `routes` gateway
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `DB_POOL_MAX` (optional) – maximum number of DB connections (default: 5)
//! - `LISTEN_PORT` (optional) – HTTP port (default: 8080)
//! - `HEALTH_SCORE_TIMEOUT_SECS` (optional) – health-score budget (default: 10)
//! - `PLANTWATCH_LOG_LEVEL`, `PLANTWATCH_SPAN_EVENTS`, `FORCE_COLOR`,
//!   `RUST_LOG` (optional) – logging, see `telemetry`
//!
//! Domain logic lives in `health`, `notifications`, `dashboard` and
//! `maintenance`; each talks to storage only through `store::EntityStore`.
use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;

mod config;
mod dashboard;
mod error;
mod health;
mod maintenance;
mod models;
mod notifications;
mod routes;
mod schema;
mod store;
mod telemetry;

pub use config::Config;
pub use error::MonitorError;
pub use store::PgStore;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    telemetry::LogSettings::from_env().install();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.listen_port));
    let app: Router = routes::router(PgStore::new(pool), cfg);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
