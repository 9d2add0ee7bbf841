//! Mailtrack - Delivery tracking server entry point

use anyhow::Result;
use axum::http::HeaderValue;
use mailtrack_api::AppState;
use mailtrack_common::config::Config;
use mailtrack_core::{Ingestor, StatsService};
use mailtrack_storage::db::DatabasePool;
use mailtrack_storage::{CampaignMessageRepository, DeliveryEventRepository, EmailRepository};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config);

    info!("Starting Mailtrack delivery tracking server...");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;
    info!("Database connection established");

    // Run migrations
    db_pool.migrate().await?;
    info!("Database migrations completed");

    // Repositories
    let campaigns = Arc::new(CampaignMessageRepository::new(db_pool.clone()));
    let emails = Arc::new(EmailRepository::new(db_pool.clone()));
    let events = Arc::new(DeliveryEventRepository::new(db_pool.clone()));

    // Ingestion pipeline
    let ingestor = Arc::new(Ingestor::new(
        campaigns.clone(),
        emails.clone(),
        events.clone(),
        config.webhook.secret.clone(),
    ));
    if config.webhook.secret.is_none() {
        info!("Webhook signature verification disabled (no secret configured)");
    }

    // Read path with cache
    let stats = Arc::new(StatsService::new(
        campaigns,
        emails,
        events,
        Duration::from_secs(config.cache.ttl_secs),
    ));

    let state = Arc::new(AppState {
        db_pool: db_pool.clone(),
        ingestor,
        stats,
        signature_header: config.webhook.signature_header.clone(),
    });

    let app = mailtrack_api::create_router(state).layer(build_cors(&config));

    let addr = format!("{}:{}", config.server.bind_address, config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);

    let api_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    info!("Mailtrack server started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    api_handle.abort();

    info!("Mailtrack server shutdown complete");

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},mailtrack=debug", config.logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

fn build_cors(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any);
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new().allow_origin(origins)
}
