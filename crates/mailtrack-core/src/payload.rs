//! Webhook payload validation
//!
//! Deserializes and validates the provider's JSON payload, converts the
//! unix timestamp, and builds the kind-specific event fields. The full raw
//! payload is always retained on the event for diagnostics.

use chrono::{DateTime, Utc};
use mailtrack_common::types::{BounceType, EmailIdentity, EventKind};
use mailtrack_common::{Error, Result};
use mailtrack_storage::models::NewDeliveryEvent;
use serde::Deserialize;

use crate::mapper::map_provider_event;

/// Fields required on every webhook payload
const REQUIRED_FIELDS: [&str; 4] = ["event", "message-id", "email", "ts_event"];

/// The provider's webhook payload
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// Provider event name
    pub event: String,

    /// Provider message id
    #[serde(rename = "message-id")]
    pub message_id: String,

    /// Recipient address
    pub email: String,

    /// Event timestamp, unix seconds
    pub ts_event: i64,

    /// Campaign subject
    #[serde(default)]
    pub subject: Option<String>,

    /// Bounce reason
    #[serde(default)]
    pub reason: Option<String>,

    /// Clicked link
    #[serde(default)]
    pub link: Option<String>,

    /// Opener IP address
    #[serde(default)]
    pub ip: Option<String>,

    /// Opener user agent
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// A validated inbound event, ready for the resolver
#[derive(Debug, Clone)]
pub struct IngestEvent {
    /// External identity of the email this event reports on
    pub identity: EmailIdentity,

    /// Canonical event kind
    pub kind: EventKind,

    /// When the event occurred at the provider
    pub occurred_at: DateTime<Utc>,

    /// Campaign subject, empty when the provider omits it
    pub subject: String,

    /// The event row to append
    pub event: NewDeliveryEvent,
}

impl IngestEvent {
    /// Parse and validate a raw webhook body.
    ///
    /// Rejects malformed JSON, missing required fields, and timestamps
    /// outside the representable range; nothing reaches the store on
    /// rejection.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| Error::MalformedPayload(format!("Invalid JSON: {}", e)))?;

        for field in REQUIRED_FIELDS {
            match raw.get(field) {
                None | Some(serde_json::Value::Null) => {
                    return Err(Error::MissingField(field.to_string()))
                }
                _ => {}
            }
        }

        let payload: WebhookPayload = serde_json::from_value(raw.clone())
            .map_err(|e| Error::MalformedPayload(e.to_string()))?;

        let occurred_at = DateTime::<Utc>::from_timestamp(payload.ts_event, 0)
            .ok_or(Error::InvalidTimestamp(payload.ts_event))?;

        let kind = map_provider_event(&payload.event);

        // Kind-specific extras, keyed off the provider's naming: the
        // hard/soft split only exists upstream.
        let bounce_type = if payload.event.contains("bounce") {
            if payload.event.contains("hard") {
                Some(BounceType::Hard)
            } else {
                Some(BounceType::Soft)
            }
        } else {
            None
        };
        let bounce_reason = bounce_type.and(payload.reason.clone());
        let url = (kind == EventKind::Clicked).then(|| payload.link.clone()).flatten();
        let ip = (kind == EventKind::Opened).then(|| payload.ip.clone()).flatten();
        let user_agent = (kind == EventKind::Opened)
            .then(|| payload.user_agent.clone())
            .flatten();

        Ok(Self {
            identity: EmailIdentity::new(&payload.message_id, &payload.email),
            kind: kind.clone(),
            occurred_at,
            subject: payload.subject.clone().unwrap_or_default(),
            event: NewDeliveryEvent {
                kind,
                occurred_at,
                bounce_type,
                bounce_reason,
                url,
                ip,
                user_agent,
                raw_payload: raw,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn body(event: &str, extra: &str) -> Vec<u8> {
        format!(
            r#"{{"event":"{}","message-id":"<m1@provider>","email":"user@example.com","ts_event":1700000000{}}}"#,
            event, extra
        )
        .into_bytes()
    }

    #[test]
    fn test_parse_sent_event() {
        let ev = IngestEvent::parse(&body("request", r#","subject":"Welcome""#)).unwrap();
        assert_eq!(ev.kind, EventKind::Sent);
        assert_eq!(ev.subject, "Welcome");
        assert_eq!(ev.identity.provider_message_id, "<m1@provider>");
        assert_eq!(ev.identity.recipient_address, "user@example.com");
        assert_eq!(ev.occurred_at.timestamp(), 1_700_000_000);
        assert_eq!(ev.event.raw_payload["event"], "request");
    }

    #[test]
    fn test_parse_bounce_extras() {
        let ev = IngestEvent::parse(&body("hard_bounce", r#","reason":"mailbox full"#)).unwrap_err();
        // Unterminated JSON string is malformed
        assert!(matches!(ev, Error::MalformedPayload(_)));

        let ev = IngestEvent::parse(&body("hard_bounce", r#","reason":"mailbox full""#)).unwrap();
        assert_eq!(ev.kind, EventKind::Bounced);
        assert_eq!(ev.event.bounce_type, Some(BounceType::Hard));
        assert_eq!(ev.event.bounce_reason.as_deref(), Some("mailbox full"));

        let ev = IngestEvent::parse(&body("soft_bounce", "")).unwrap();
        assert_eq!(ev.event.bounce_type, Some(BounceType::Soft));
    }

    #[test]
    fn test_parse_click_and_open_extras() {
        let ev = IngestEvent::parse(&body("click", r#","link":"https://example.com/a""#)).unwrap();
        assert_eq!(ev.kind, EventKind::Clicked);
        assert_eq!(ev.event.url.as_deref(), Some("https://example.com/a"));
        assert_eq!(ev.event.ip, None);

        let ev = IngestEvent::parse(&body(
            "opened",
            r#","ip":"203.0.113.9","user_agent":"Mozilla/5.0""#,
        ))
        .unwrap();
        assert_eq!(ev.kind, EventKind::Opened);
        assert_eq!(ev.event.ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(ev.event.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(ev.event.url, None);
    }

    #[test]
    fn test_missing_fields_rejected() {
        let err = IngestEvent::parse(br#"{"event":"delivered","email":"a@b.c","ts_event":1}"#)
            .unwrap_err();
        assert!(matches!(err, Error::MissingField(f) if f == "message-id"));

        let err = IngestEvent::parse(
            br#"{"message-id":"<m>","email":"a@b.c","ts_event":1,"event":null}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingField(f) if f == "event"));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            IngestEvent::parse(b"not json"),
            Err(Error::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_invalid_timestamp_rejected() {
        let body = format!(
            r#"{{"event":"delivered","message-id":"<m>","email":"a@b.c","ts_event":{}}}"#,
            i64::MAX
        );
        assert!(matches!(
            IngestEvent::parse(body.as_bytes()),
            Err(Error::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_unknown_event_passes_through() {
        let ev = IngestEvent::parse(&body("proxy_open", "")).unwrap();
        assert_eq!(ev.kind, EventKind::Other("proxy_open".to_string()));
    }
}
