//! Mailtrack Core - delivery lifecycle engine
//!
//! Ingests provider webhook events (at-least-once, unordered, possibly
//! duplicated) and converges each email to a single authoritative current
//! status, plus the cache-first read path that aggregates those events
//! into dashboard statistics.

pub mod cache;
pub mod ingest;
pub mod mapper;
pub mod payload;
pub mod signature;
pub mod stats;
pub mod status;
pub mod testing;

pub use cache::CacheService;
pub use ingest::{IngestOutcome, Ingestor};
pub use mapper::map_provider_event;
pub use payload::{IngestEvent, WebhookPayload};
pub use signature::{sign_body, verify_signature};
pub use stats::{DashboardStats, EmailDetail, EmailSummary, Queried, StatsService};
pub use status::derive_status;
