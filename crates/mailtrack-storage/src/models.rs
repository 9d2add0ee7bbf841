//! Database models

use chrono::{DateTime, NaiveDate, Utc};
use mailtrack_common::types::{
    BounceType, CampaignMessageId, DeliveryEventId, EmailId, EmailIdentity, EventKind,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Campaign message model.
///
/// A logical send campaign, identified by (subject, sent_date). Created
/// lazily on the first "sent" event that references an unseen identity and
/// never deleted afterwards.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignMessage {
    pub id: CampaignMessageId,
    pub subject: String,
    pub sent_date: NaiveDate,
    pub total_sent: i64,
    pub created_at: DateTime<Utc>,
}

/// Email model.
///
/// One outbound message to one recipient. `sent_at` is set once from the
/// "sent" event and never changes; `current_status` is derived and
/// recomputed on every appended event.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Email {
    pub id: EmailId,
    pub campaign_message_id: CampaignMessageId,
    pub provider_message_id: String,
    pub recipient_address: String,
    pub sent_at: DateTime<Utc>,
    pub current_status: String,
    pub created_at: DateTime<Utc>,
}

impl Email {
    /// External identity pair of this email
    pub fn identity(&self) -> EmailIdentity {
        EmailIdentity::new(&self.provider_message_id, &self.recipient_address)
    }

    /// Current status as a typed event kind
    pub fn status(&self) -> EventKind {
        EventKind::parse(&self.current_status)
    }
}

/// Email row joined with its campaign subject, for listing views
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EmailOverview {
    pub id: EmailId,
    pub provider_message_id: String,
    pub recipient_address: String,
    pub subject: String,
    pub sent_at: DateTime<Utc>,
    pub current_status: String,
}

/// Delivery event model.
///
/// Append-only; one row per lifecycle occurrence. Unique per
/// (email_id, kind, occurred_at) so redelivered webhooks are no-ops.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub id: DeliveryEventId,
    pub email_id: EmailId,
    pub kind: String,
    pub occurred_at: DateTime<Utc>,
    pub bounce_type: Option<String>,
    pub bounce_reason: Option<String>,
    pub url: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub raw_payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl DeliveryEvent {
    /// Canonical kind of this event
    pub fn kind(&self) -> EventKind {
        EventKind::parse(&self.kind)
    }
}

/// Input for creating an email record
#[derive(Debug, Clone)]
pub struct NewEmail {
    pub campaign_message_id: CampaignMessageId,
    pub provider_message_id: String,
    pub recipient_address: String,
    pub sent_at: DateTime<Utc>,
    pub current_status: EventKind,
}

/// Input for appending a delivery event. The owning email id is supplied
/// by the repository call, not the payload.
#[derive(Debug, Clone)]
pub struct NewDeliveryEvent {
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
    pub bounce_type: Option<BounceType>,
    pub bounce_reason: Option<String>,
    pub url: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub raw_payload: serde_json::Value,
}

/// Outcome of an atomic email create-if-absent
#[derive(Debug, Clone)]
pub enum CreateEmailOutcome {
    /// The email was created, together with its first event
    Created(Email),
    /// Another request already created this identity; the existing row
    Existing(Email),
}

impl CreateEmailOutcome {
    pub fn email(&self) -> &Email {
        match self {
            CreateEmailOutcome::Created(email) => email,
            CreateEmailOutcome::Existing(email) => email,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, CreateEmailOutcome::Created(_))
    }
}
