#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Staffdir API Server
//!
//! Personnel-directory backend: user CRUD and authentication endpoints
//! with JWT-based request authentication and admin-gated mutations.

mod auth;
mod config;
mod db;
mod directory;
mod error;
mod routes;
mod seed;
mod state;

use std::net::SocketAddr;

use axum::http::{header, Method};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{config::Config, routes::create_router, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,staffdir_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Staffdir API Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database connection established");

    // Run migrations on a dedicated single-connection pool
    tracing::info!("Running database migrations...");
    let migration_url = config
        .database_direct_url
        .as_ref()
        .unwrap_or(&config.database_url);
    let migration_pool = db::create_migration_pool(migration_url).await?;
    db::run_migrations(&migration_pool).await?;
    migration_pool.close().await;
    tracing::info!("Database migrations complete");

    // Seed the directory when it is empty (idempotent)
    if let Err(e) = seed::ensure_seed_data(&pool, &config.seed_file).await {
        tracing::error!(error = ?e, "Seeding failed, continuing startup");
    }

    // Create application state
    let state = AppState::new(pool, config.clone());

    // Build CORS layer - restrict to allowed origins only
    let allowed_origins: Vec<axum::http::HeaderValue> = std::env::var("ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:5173,http://127.0.0.1:5173".to_string())
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    tracing::info!(
        allowed_origins = ?allowed_origins,
        "CORS configured with {} allowed origins",
        allowed_origins.len()
    );

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
        ])
        .allow_credentials(true);

    // Build the router
    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Parse bind address
    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Starting server on {}", addr);

    // Start the server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
