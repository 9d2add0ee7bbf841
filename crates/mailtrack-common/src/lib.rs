//! Mailtrack Common - shared types and utilities
//!
//! Configuration, the error taxonomy, and the canonical event vocabulary
//! shared by every Mailtrack crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
