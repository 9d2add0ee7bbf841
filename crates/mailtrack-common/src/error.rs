//! Error types for Mailtrack

use thiserror::Error;

/// Main error type for Mailtrack
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    #[error("Backing store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Mailtrack
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Config(_) => 500,
            Error::Database(_) => 500,
            Error::InvalidSignature => 400,
            Error::MalformedPayload(_) => 400,
            Error::MissingField(_) => 400,
            Error::InvalidTimestamp(_) => 400,
            Error::StoreUnavailable(_) => 503,
            Error::NotFound(_) => 404,
            Error::Internal(_) => 500,
            Error::Other(_) => 500,
        }
    }

    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::InvalidSignature => "INVALID_SIGNATURE",
            Error::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            Error::MissingField(_) => "MISSING_FIELD",
            Error::InvalidTimestamp(_) => "INVALID_TIMESTAMP",
            Error::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the upstream provider should retry delivery of the request
    /// that produced this error. Only transient store failures qualify;
    /// boundary rejections are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_) | Error::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::InvalidSignature.status_code(), 400);
        assert_eq!(Error::InvalidTimestamp(-1).status_code(), 400);
        assert_eq!(Error::StoreUnavailable("down".into()).status_code(), 503);
        assert_eq!(Error::NotFound("email".into()).status_code(), 404);
    }

    #[test]
    fn test_retryable() {
        assert!(Error::StoreUnavailable("timeout".into()).is_retryable());
        assert!(!Error::InvalidSignature.is_retryable());
        assert!(!Error::MalformedPayload("bad json".into()).is_retryable());
    }
}
