//! Mailtrack API - REST surface
//!
//! The inbound webhook endpoint and the read query interface consumed by
//! dashboard clients, plus health checks and the OpenAPI document.

pub mod handlers;
pub mod openapi;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;
