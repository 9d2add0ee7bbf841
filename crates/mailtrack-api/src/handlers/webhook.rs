//! Inbound webhook handler

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;

use crate::handlers::error_response;
use crate::state::AppState;
use mailtrack_core::IngestOutcome;

/// Acknowledgement returned to the provider
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    /// "ok" or "ignored"
    pub status: String,
    /// Set when status is "ignored"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Receive one provider webhook delivery.
///
/// Duplicates acknowledge with "ok" since no error occurred; the gating
/// case answers "ignored" so the provider's logs show why nothing was
/// recorded. Non-2xx responses drive the provider's own retry policy.
#[utoipa::path(
    post,
    path = "/webhooks/provider",
    tag = "webhooks",
    responses(
        (status = 200, description = "Event ingested or ignored", body = WebhookAck),
        (status = 400, description = "Rejected at the boundary"),
        (status = 503, description = "Store unavailable, retry later")
    )
)]
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, (StatusCode, Json<serde_json::Value>)> {
    let signature = headers
        .get(state.signature_header.as_str())
        .and_then(|value| value.to_str().ok());

    match state.ingestor.ingest(&body, signature).await {
        Ok(IngestOutcome::Accepted) | Ok(IngestOutcome::Duplicate) => Ok(Json(WebhookAck {
            status: "ok".to_string(),
            reason: None,
        })),
        Ok(IngestOutcome::Ignored) => Ok(Json(WebhookAck {
            status: "ignored".to_string(),
            reason: Some("no_sent_event".to_string()),
        })),
        Err(e) => {
            warn!(error = %e, code = e.code(), "Webhook rejected");
            Err(error_response(&e))
        }
    }
}
