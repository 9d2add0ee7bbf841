//! Webhook signature verification
//!
//! HMAC-SHA256 over the raw request body, hex encoded, compared in
//! constant time. With no secret configured, verification is an explicit
//! opt-out, not a failure.

use hmac::{Hmac, Mac};
use mailtrack_common::{Error, Result};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify a webhook signature against the raw body.
///
/// Callers must reject the request before any further processing when this
/// returns `InvalidSignature`.
pub fn verify_signature(secret: Option<&str>, body: &[u8], provided: Option<&str>) -> Result<()> {
    let Some(secret) = secret else {
        // No secret configured: verification skipped
        return Ok(());
    };

    let provided = provided.ok_or(Error::InvalidSignature)?;
    let provided = hex::decode(provided.trim()).map_err(|_| Error::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Internal(format!("HMAC init failed: {}", e)))?;
    mac.update(body);

    // Mac::verify_slice is constant-time
    mac.verify_slice(&provided)
        .map_err(|_| Error::InvalidSignature)
}

/// Compute the hex-encoded signature for a body. Counterpart of
/// [`verify_signature`], used by tests and provider setup tooling.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let body = br#"{"event":"delivered"}"#;
        let sig = sign_body("secret", body);
        assert!(verify_signature(Some("secret"), body, Some(&sig)).is_ok());
    }

    #[test]
    fn test_mismatch_rejected() {
        let body = br#"{"event":"delivered"}"#;
        let sig = sign_body("secret", body);
        assert!(matches!(
            verify_signature(Some("other-secret"), body, Some(&sig)),
            Err(Error::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature(Some("secret"), b"tampered", Some(&sig)),
            Err(Error::InvalidSignature)
        ));
    }

    #[test]
    fn test_missing_or_malformed_header() {
        assert!(matches!(
            verify_signature(Some("secret"), b"body", None),
            Err(Error::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature(Some("secret"), b"body", Some("not-hex!")),
            Err(Error::InvalidSignature)
        ));
    }

    #[test]
    fn test_no_secret_skips_verification() {
        assert!(verify_signature(None, b"body", None).is_ok());
        assert!(verify_signature(None, b"body", Some("anything")).is_ok());
    }
}
