//! Dashboard stats handler

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::handlers::{error_response, parse_window};
use crate::state::AppState;
use mailtrack_core::stats::DashboardStats;

/// Stats query parameters
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Lookback window: "24h", "7d", "30d", "90d"
    pub range: Option<String>,
}

/// Dashboard stats response
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub total_sent: i64,
    pub delivered: i64,
    pub bounced: i64,
    pub opened: i64,
    pub clicked: i64,
    pub delivery_rate: f64,
    pub bounce_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub click_to_open_rate: f64,
    pub avg_delivery_seconds: f64,
    /// "live" or "stale"
    pub freshness: String,
    /// False when the response was served from the cache because the
    /// backing store is unreachable
    pub api_healthy: bool,
}

impl DashboardResponse {
    fn new(stats: DashboardStats, stale: bool) -> Self {
        Self {
            total_sent: stats.total_sent,
            delivered: stats.delivered,
            bounced: stats.bounced,
            opened: stats.opened,
            clicked: stats.clicked,
            delivery_rate: stats.delivery_rate,
            bounce_rate: stats.bounce_rate,
            open_rate: stats.open_rate,
            click_rate: stats.click_rate,
            click_to_open_rate: stats.click_to_open_rate,
            avg_delivery_seconds: stats.avg_delivery_seconds,
            freshness: if stale { "stale" } else { "live" }.to_string(),
            api_healthy: !stale,
        }
    }
}

/// Dashboard aggregates for a window
#[utoipa::path(
    get,
    path = "/stats/dashboard",
    tag = "stats",
    params(
        ("range" = Option<String>, Query, description = "Lookback window: 24h, 7d, 30d, 90d")
    ),
    responses(
        (status = 200, description = "Aggregated stats", body = DashboardResponse),
        (status = 400, description = "Unknown range"),
        (status = 503, description = "Store unavailable and no cached value")
    )
)]
pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<DashboardResponse>, (StatusCode, Json<serde_json::Value>)> {
    let window = parse_window(query.range.as_deref())?;

    let result = state.stats.dashboard_stats(&window).await.map_err(|e| {
        error!(error = %e, "Dashboard stats query failed");
        error_response(&e)
    })?;

    let stale = result.freshness.is_stale();
    Ok(Json(DashboardResponse::new(result.value, stale)))
}
