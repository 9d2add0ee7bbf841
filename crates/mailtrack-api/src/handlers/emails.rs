//! Email listing and detail handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::handlers::{error_response, parse_window};
use crate::state::AppState;
use mailtrack_common::types::EmailIdentity;
use mailtrack_core::stats::{EmailDetail, EmailSummary};
use mailtrack_storage::models::DeliveryEvent;

/// Listing query parameters
#[derive(Debug, Deserialize)]
pub struct ListEmailsQuery {
    /// Lookback window: "24h", "7d", "30d", "90d"
    pub range: Option<String>,
    /// Case-insensitive substring over recipient address and subject
    pub q: Option<String>,
}

/// One email in the listing response
#[derive(Debug, Serialize, ToSchema)]
pub struct EmailSummaryResponse {
    pub provider_message_id: String,
    pub recipient_address: String,
    pub subject: String,
    pub sent_at: DateTime<Utc>,
    pub current_status: String,
}

impl From<EmailSummary> for EmailSummaryResponse {
    fn from(summary: EmailSummary) -> Self {
        Self {
            provider_message_id: summary.provider_message_id,
            recipient_address: summary.recipient_address,
            subject: summary.subject,
            sent_at: summary.sent_at,
            current_status: summary.current_status,
        }
    }
}

/// Email listing response
#[derive(Debug, Serialize, ToSchema)]
pub struct EmailListResponse {
    pub emails: Vec<EmailSummaryResponse>,
    pub count: usize,
    /// "live" or "stale"
    pub freshness: String,
}

/// One event in the detail timeline
#[derive(Debug, Serialize, ToSchema)]
pub struct EventResponse {
    pub kind: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounce_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounce_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl From<DeliveryEvent> for EventResponse {
    fn from(event: DeliveryEvent) -> Self {
        Self {
            kind: event.kind,
            occurred_at: event.occurred_at,
            bounce_type: event.bounce_type,
            bounce_reason: event.bounce_reason,
            url: event.url,
            ip: event.ip,
            user_agent: event.user_agent,
        }
    }
}

/// Single email detail response
#[derive(Debug, Serialize, ToSchema)]
pub struct EmailDetailResponse {
    pub provider_message_id: String,
    pub recipient_address: String,
    pub subject: String,
    pub sent_at: DateTime<Utc>,
    pub current_status: String,
    pub events: Vec<EventResponse>,
    /// "live" or "stale"
    pub freshness: String,
}

impl EmailDetailResponse {
    fn new(detail: EmailDetail, freshness: &str) -> Self {
        Self {
            provider_message_id: detail.provider_message_id,
            recipient_address: detail.recipient_address,
            subject: detail.subject,
            sent_at: detail.sent_at,
            current_status: detail.current_status,
            events: detail.events.into_iter().map(EventResponse::from).collect(),
            freshness: freshness.to_string(),
        }
    }
}

/// List emails in a window
#[utoipa::path(
    get,
    path = "/emails",
    tag = "emails",
    params(
        ("range" = Option<String>, Query, description = "Lookback window: 24h, 7d, 30d, 90d"),
        ("q" = Option<String>, Query, description = "Search over recipient and subject")
    ),
    responses(
        (status = 200, description = "Emails in the window", body = EmailListResponse),
        (status = 400, description = "Unknown range"),
        (status = 503, description = "Store unavailable and no cached value")
    )
)]
pub async fn list_emails(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListEmailsQuery>,
) -> Result<Json<EmailListResponse>, (StatusCode, Json<serde_json::Value>)> {
    let window = parse_window(query.range.as_deref())?;
    let search = query.q.as_deref().filter(|q| !q.is_empty());

    let result = state
        .stats
        .list_emails(&window, search)
        .await
        .map_err(|e| {
            error!(error = %e, "Email listing query failed");
            error_response(&e)
        })?;

    let freshness = if result.freshness.is_stale() {
        "stale"
    } else {
        "live"
    };
    let emails: Vec<EmailSummaryResponse> = result
        .value
        .into_iter()
        .map(EmailSummaryResponse::from)
        .collect();

    Ok(Json(EmailListResponse {
        count: emails.len(),
        emails,
        freshness: freshness.to_string(),
    }))
}

/// Single email with its event timeline
#[utoipa::path(
    get,
    path = "/emails/{provider_message_id}/{recipient}",
    tag = "emails",
    params(
        ("provider_message_id" = String, Path, description = "Provider-assigned message id"),
        ("recipient" = String, Path, description = "Recipient address")
    ),
    responses(
        (status = 200, description = "Email detail", body = EmailDetailResponse),
        (status = 404, description = "No such email"),
        (status = 503, description = "Store unavailable and no cached value")
    )
)]
pub async fn email_detail(
    State(state): State<Arc<AppState>>,
    Path((provider_message_id, recipient)): Path<(String, String)>,
) -> Result<Json<EmailDetailResponse>, (StatusCode, Json<serde_json::Value>)> {
    let identity = EmailIdentity::new(&provider_message_id, &recipient);

    let result = state.stats.email_detail(&identity).await.map_err(|e| {
        error!(error = %e, identity = %identity, "Email detail query failed");
        error_response(&e)
    })?;

    let freshness = if result.freshness.is_stale() {
        "stale"
    } else {
        "live"
    };

    Ok(Json(EmailDetailResponse::new(result.value, freshness)))
}
