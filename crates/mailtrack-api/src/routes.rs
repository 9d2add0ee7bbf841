//! API routes

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{emails, health, stats, webhook};
use crate::openapi::create_openapi_routes;
use crate::state::AppState;

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness));

    let webhook_routes = Router::new().route("/provider", post(webhook::receive_webhook));

    let stats_routes = Router::new().route("/dashboard", get(stats::dashboard_stats));

    let email_routes = Router::new()
        .route("/", get(emails::list_emails))
        .route("/:provider_message_id/:recipient", get(emails::email_detail));

    Router::new()
        .nest("/health", health_routes)
        .nest("/webhooks", webhook_routes)
        .nest("/stats", stats_routes)
        .nest("/emails", email_routes)
        .with_state(state)
        .merge(create_openapi_routes())
        .layer(TraceLayer::new_for_http())
}
