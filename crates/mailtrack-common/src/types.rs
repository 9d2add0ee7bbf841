//! Common types for Mailtrack

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for campaign messages
pub type CampaignMessageId = Uuid;

/// Unique identifier for emails
pub type EmailId = Uuid;

/// Unique identifier for delivery events
pub type DeliveryEventId = Uuid;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

/// Canonical event kind.
///
/// The system's internal vocabulary for lifecycle events, independent of
/// the upstream provider's naming. Unknown provider names are preserved as
/// `Other` rather than dropped, so a provider rollout of a new event kind
/// never loses data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Sent,
    Delivered,
    Bounced,
    Blocked,
    Spam,
    Unsubscribed,
    Opened,
    Clicked,
    Deferred,
    Complaint,
    Other(String),
}

impl EventKind {
    /// Canonical string form, stored in the database and used in responses
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Sent => "sent",
            EventKind::Delivered => "delivered",
            EventKind::Bounced => "bounced",
            EventKind::Blocked => "blocked",
            EventKind::Spam => "spam",
            EventKind::Unsubscribed => "unsubscribed",
            EventKind::Opened => "opened",
            EventKind::Clicked => "clicked",
            EventKind::Deferred => "deferred",
            EventKind::Complaint => "complaint",
            EventKind::Other(name) => name,
        }
    }

    /// Parse a canonical string back into an event kind.
    ///
    /// Inverse of [`as_str`](Self::as_str); anything outside the closed set
    /// comes back as `Other`.
    pub fn parse(s: &str) -> Self {
        match s {
            "sent" => EventKind::Sent,
            "delivered" => EventKind::Delivered,
            "bounced" => EventKind::Bounced,
            "blocked" => EventKind::Blocked,
            "spam" => EventKind::Spam,
            "unsubscribed" => EventKind::Unsubscribed,
            "opened" => EventKind::Opened,
            "clicked" => EventKind::Clicked,
            "deferred" => EventKind::Deferred,
            "complaint" => EventKind::Complaint,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EventKind::parse(&s))
    }
}

/// Bounce classification carried on bounced events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BounceType {
    Hard,
    Soft,
}

impl BounceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BounceType::Hard => "hard",
            BounceType::Soft => "soft",
        }
    }
}

impl std::fmt::Display for BounceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External identity of an email: the provider's message id plus the
/// recipient address. Unique per outbound email.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailIdentity {
    pub provider_message_id: String,
    pub recipient_address: String,
}

impl EmailIdentity {
    pub fn new(
        provider_message_id: impl Into<String>,
        recipient_address: impl Into<String>,
    ) -> Self {
        Self {
            provider_message_id: provider_message_id.into(),
            recipient_address: recipient_address.into(),
        }
    }
}

impl std::fmt::Display for EmailIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider_message_id, self.recipient_address)
    }
}

/// Date-range selector for the read path.
///
/// One of the enumerated lookback windows, or an explicit range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    Last24Hours,
    Last7Days,
    Last30Days,
    Last90Days,
    Range {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl TimeWindow {
    /// Parse the query-string form ("24h", "7d", "30d", "90d")
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "24h" => Some(TimeWindow::Last24Hours),
            "7d" => Some(TimeWindow::Last7Days),
            "30d" => Some(TimeWindow::Last30Days),
            "90d" => Some(TimeWindow::Last90Days),
            _ => None,
        }
    }

    /// Resolve the window to concrete bounds, anchored at `now` for the
    /// lookback variants.
    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            TimeWindow::Last24Hours => (now - Duration::hours(24), now),
            TimeWindow::Last7Days => (now - Duration::days(7), now),
            TimeWindow::Last30Days => (now - Duration::days(30), now),
            TimeWindow::Last90Days => (now - Duration::days(90), now),
            TimeWindow::Range { from, to } => (*from, *to),
        }
    }

    /// Stable key fragment for cache keys
    pub fn cache_fragment(&self) -> String {
        match self {
            TimeWindow::Last24Hours => "24h".to_string(),
            TimeWindow::Last7Days => "7d".to_string(),
            TimeWindow::Last30Days => "30d".to_string(),
            TimeWindow::Last90Days => "90d".to_string(),
            TimeWindow::Range { from, to } => {
                format!("{}_{}", from.timestamp(), to.timestamp())
            }
        }
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        TimeWindow::Last30Days
    }
}

/// Freshness of a read-path result: computed live, or served from the
/// cache because the backing store was unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Live,
    Stale,
}

impl Freshness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Freshness::Stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_event_kind_round_trip() {
        assert_eq!(EventKind::parse("delivered"), EventKind::Delivered);
        assert_eq!(EventKind::Delivered.as_str(), "delivered");
        assert_eq!(EventKind::parse("sent").as_str(), "sent");
    }

    #[test]
    fn test_event_kind_passthrough() {
        let kind = EventKind::parse("proxy_open");
        assert_eq!(kind, EventKind::Other("proxy_open".to_string()));
        assert_eq!(kind.as_str(), "proxy_open");
    }

    #[test]
    fn test_event_kind_serde_as_string() {
        let json = serde_json::to_string(&EventKind::Clicked).unwrap();
        assert_eq!(json, "\"clicked\"");
        let kind: EventKind = serde_json::from_str("\"unknown_kind\"").unwrap();
        assert_eq!(kind, EventKind::Other("unknown_kind".to_string()));
    }

    #[test]
    fn test_time_window_parse() {
        assert_eq!(TimeWindow::parse("7d"), Some(TimeWindow::Last7Days));
        assert_eq!(TimeWindow::parse("24h"), Some(TimeWindow::Last24Hours));
        assert_eq!(TimeWindow::parse("1y"), None);
    }

    #[test]
    fn test_time_window_bounds() {
        let now = Utc::now();
        let (from, to) = TimeWindow::Last7Days.bounds(now);
        assert_eq!(to, now);
        assert_eq!(to - from, Duration::days(7));
    }

    #[test]
    fn test_identity_display() {
        let id = EmailIdentity::new("<msg-1@provider>", "user@example.com");
        assert_eq!(id.to_string(), "<msg-1@provider>:user@example.com");
    }
}
