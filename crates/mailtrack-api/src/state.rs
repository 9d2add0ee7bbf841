//! Application state shared across handlers

use mailtrack_core::{Ingestor, StatsService};
use mailtrack_storage::DatabasePool;
use std::sync::Arc;

/// Application state shared across handlers
pub struct AppState {
    pub db_pool: DatabasePool,
    pub ingestor: Arc<Ingestor>,
    pub stats: Arc<StatsService>,
    /// Header the provider puts the HMAC signature in
    pub signature_header: String,
}
