//! OpenAPI documentation
//!
//! Provides the OpenAPI 3.0 specification and Swagger UI for the
//! Mailtrack API.

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde_json::json;

/// Create OpenAPI routes
pub fn create_openapi_routes() -> Router {
    Router::new()
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
}

/// OpenAPI JSON specification endpoint
async fn openapi_json() -> impl IntoResponse {
    Json(get_openapi_spec())
}

/// Swagger UI HTML endpoint
async fn swagger_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

/// Get the OpenAPI specification as JSON
fn get_openapi_spec() -> serde_json::Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Mailtrack API",
            "description": "Delivery tracking for outbound email: webhook ingestion, status derivation, and cached dashboard stats.",
            "version": "1.0.0"
        },
        "tags": [
            {"name": "health", "description": "Health check endpoints"},
            {"name": "webhooks", "description": "Provider webhook ingestion"},
            {"name": "stats", "description": "Dashboard aggregates"},
            {"name": "emails", "description": "Email listing and detail"}
        ],
        "paths": {
            "/health": {
                "get": {
                    "tags": ["health"],
                    "summary": "Basic health check",
                    "operationId": "health",
                    "responses": {
                        "200": {"description": "Service is healthy"}
                    }
                }
            },
            "/health/live": {
                "get": {
                    "tags": ["health"],
                    "summary": "Liveness check",
                    "operationId": "liveness",
                    "responses": {
                        "200": {"description": "Service is alive"}
                    }
                }
            },
            "/health/ready": {
                "get": {
                    "tags": ["health"],
                    "summary": "Readiness check",
                    "operationId": "readiness",
                    "responses": {
                        "200": {"description": "Service is ready"},
                        "503": {"description": "Service is not ready"}
                    }
                }
            },
            "/webhooks/provider": {
                "post": {
                    "tags": ["webhooks"],
                    "summary": "Receive one provider webhook delivery",
                    "operationId": "receive_webhook",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/WebhookPayload"}
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Event ingested, deduplicated, or ignored",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/WebhookAck"}
                                }
                            }
                        },
                        "400": {"description": "Rejected at the boundary (signature, payload, fields, timestamp)"},
                        "503": {"description": "Store unavailable, retry later"}
                    }
                }
            },
            "/stats/dashboard": {
                "get": {
                    "tags": ["stats"],
                    "summary": "Dashboard aggregates for a window",
                    "operationId": "dashboard_stats",
                    "parameters": [
                        {
                            "name": "range",
                            "in": "query",
                            "required": false,
                            "schema": {"type": "string", "enum": ["24h", "7d", "30d", "90d"], "default": "30d"}
                        }
                    ],
                    "responses": {
                        "200": {
                            "description": "Aggregated stats",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/DashboardResponse"}
                                }
                            }
                        },
                        "400": {"description": "Unknown range"},
                        "503": {"description": "Store unavailable and no cached value"}
                    }
                }
            },
            "/emails": {
                "get": {
                    "tags": ["emails"],
                    "summary": "List emails in a window",
                    "operationId": "list_emails",
                    "parameters": [
                        {
                            "name": "range",
                            "in": "query",
                            "required": false,
                            "schema": {"type": "string", "enum": ["24h", "7d", "30d", "90d"], "default": "30d"}
                        },
                        {
                            "name": "q",
                            "in": "query",
                            "required": false,
                            "schema": {"type": "string"},
                            "description": "Search over recipient address and subject"
                        }
                    ],
                    "responses": {
                        "200": {"description": "Emails in the window"},
                        "400": {"description": "Unknown range"},
                        "503": {"description": "Store unavailable and no cached value"}
                    }
                }
            },
            "/emails/{provider_message_id}/{recipient}": {
                "get": {
                    "tags": ["emails"],
                    "summary": "Single email with its event timeline",
                    "operationId": "email_detail",
                    "parameters": [
                        {
                            "name": "provider_message_id",
                            "in": "path",
                            "required": true,
                            "schema": {"type": "string"}
                        },
                        {
                            "name": "recipient",
                            "in": "path",
                            "required": true,
                            "schema": {"type": "string"}
                        }
                    ],
                    "responses": {
                        "200": {"description": "Email detail"},
                        "404": {"description": "No such email"},
                        "503": {"description": "Store unavailable and no cached value"}
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "WebhookPayload": {
                    "type": "object",
                    "required": ["event", "message-id", "email", "ts_event"],
                    "properties": {
                        "event": {"type": "string", "example": "delivered"},
                        "message-id": {"type": "string", "example": "<202608231015.12345@smtp-relay.example>"},
                        "email": {"type": "string", "example": "user@example.com"},
                        "ts_event": {"type": "integer", "format": "int64", "example": 1755950000},
                        "subject": {"type": "string"},
                        "reason": {"type": "string"},
                        "link": {"type": "string"},
                        "ip": {"type": "string"},
                        "user_agent": {"type": "string"}
                    }
                },
                "WebhookAck": {
                    "type": "object",
                    "required": ["status"],
                    "properties": {
                        "status": {"type": "string", "enum": ["ok", "ignored"]},
                        "reason": {"type": "string", "example": "no_sent_event"}
                    }
                },
                "DashboardResponse": {
                    "type": "object",
                    "properties": {
                        "total_sent": {"type": "integer", "format": "int64"},
                        "delivered": {"type": "integer", "format": "int64"},
                        "bounced": {"type": "integer", "format": "int64"},
                        "opened": {"type": "integer", "format": "int64"},
                        "clicked": {"type": "integer", "format": "int64"},
                        "delivery_rate": {"type": "number", "format": "double"},
                        "bounce_rate": {"type": "number", "format": "double"},
                        "open_rate": {"type": "number", "format": "double"},
                        "click_rate": {"type": "number", "format": "double"},
                        "click_to_open_rate": {"type": "number", "format": "double"},
                        "avg_delivery_seconds": {"type": "number", "format": "double"},
                        "freshness": {"type": "string", "enum": ["live", "stale"]},
                        "api_healthy": {"type": "boolean"}
                    }
                }
            }
        }
    })
}

/// Swagger UI HTML page
const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Mailtrack API Documentation</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
        window.onload = () => {
            SwaggerUIBundle({
                url: '/openapi.json',
                dom_id: '#swagger-ui',
            });
        };
    </script>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lists_all_paths() {
        let spec = get_openapi_spec();
        let paths = spec["paths"].as_object().unwrap();

        assert!(paths.contains_key("/health"));
        assert!(paths.contains_key("/webhooks/provider"));
        assert!(paths.contains_key("/stats/dashboard"));
        assert!(paths.contains_key("/emails"));
        assert!(paths.contains_key("/emails/{provider_message_id}/{recipient}"));
    }
}
