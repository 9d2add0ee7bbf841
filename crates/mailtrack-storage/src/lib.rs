//! Mailtrack Storage - database access layer
//!
//! PostgreSQL-backed persistence for campaign messages, emails, and their
//! delivery event logs, exposed through repository traits so the engine
//! never depends on the query language directly.

pub mod db;
pub mod models;
pub mod repository;

pub use db::{Database, DatabasePool};
pub use models::*;
pub use repository::*;
