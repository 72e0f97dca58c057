mod auth;
mod config;
mod db;
mod engine;
mod errors;
mod models;
mod routes;
mod state;
mod store;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::engine::{EngineConfig, VotingEngine};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{DocumentStore, MemoryStore, PgDocumentStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Urbindex API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;

    let engine = VotingEngine::new(
        store,
        EngineConfig {
            max_rating_attempts: config.rating_max_attempts,
        },
    );
    info!(
        "Voting engine ready (rating attempts: {})",
        config.rating_max_attempts
    );

    let state = AppState {
        engine,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Postgres when `DATABASE_URL` is set, otherwise the in-memory store.
async fn build_store(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    match &config.database_url {
        Some(url) => {
            let pool = create_pool(url, config.db_max_connections)
                .await
                .context("Failed to connect to the document database")?;
            ensure_schema(&pool).await?;
            Ok(Arc::new(PgDocumentStore::new(pool)))
        }
        None => {
            info!("DATABASE_URL not set; using the in-memory document store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
