//! Request handlers

pub mod emails;
pub mod health;
pub mod stats;
pub mod webhook;

use axum::http::StatusCode;
use axum::Json;
use mailtrack_common::types::TimeWindow;
use mailtrack_common::Error;
use serde_json::json;

/// Map an engine error onto an HTTP response body
pub(crate) fn error_response(error: &Error) -> (StatusCode, Json<serde_json::Value>) {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let body = match error {
        Error::StoreUnavailable(_) => json!({
            "status": "unavailable",
            "code": error.code(),
        }),
        _ => json!({
            "status": "error",
            "code": error.code(),
            "message": error.to_string(),
        }),
    };

    (status, Json(body))
}

/// Parse the `range` query parameter, defaulting to the 30-day lookback
pub(crate) fn parse_window(
    range: Option<&str>,
) -> Result<TimeWindow, (StatusCode, Json<serde_json::Value>)> {
    match range {
        None => Ok(TimeWindow::default()),
        Some(raw) => TimeWindow::parse(raw).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "status": "error",
                    "code": "INVALID_RANGE",
                    "message": format!("Unknown range: {}", raw),
                })),
            )
        }),
    }
}
