//! Ingestion pipeline
//!
//! Wires signature verification, payload validation, identity resolution,
//! dedup append, and status recomputation. Webhooks arrive at-least-once
//! and unordered; every step is idempotent so redelivery and reordering
//! converge to the same state.

use std::sync::Arc;
use tracing::{debug, info};

use mailtrack_common::types::EventKind;
use mailtrack_common::Result;
use mailtrack_storage::models::{CreateEmailOutcome, Email, NewEmail};
use mailtrack_storage::{
    CampaignMessageRepositoryTrait, DeliveryEventRepositoryTrait, EmailRepositoryTrait,
};

use crate::payload::IngestEvent;
use crate::signature::verify_signature;
use crate::status::derive_status;

/// Outcome of ingesting one webhook delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new event was recorded
    Accepted,
    /// The identical event was already recorded; idempotent no-op
    Duplicate,
    /// The event references an identity with no "sent" event yet and was
    /// dropped under the gating rule
    Ignored,
}

/// The ingestion engine
pub struct Ingestor {
    campaigns: Arc<dyn CampaignMessageRepositoryTrait>,
    emails: Arc<dyn EmailRepositoryTrait>,
    events: Arc<dyn DeliveryEventRepositoryTrait>,
    secret: Option<String>,
}

impl Ingestor {
    /// Create a new ingestor
    pub fn new(
        campaigns: Arc<dyn CampaignMessageRepositoryTrait>,
        emails: Arc<dyn EmailRepositoryTrait>,
        events: Arc<dyn DeliveryEventRepositoryTrait>,
        secret: Option<String>,
    ) -> Self {
        Self {
            campaigns,
            emails,
            events,
            secret,
        }
    }

    /// Ingest one raw webhook delivery.
    ///
    /// Verification and validation failures return before any repository
    /// call, so rejected requests leave no partial state behind.
    pub async fn ingest(&self, body: &[u8], signature: Option<&str>) -> Result<IngestOutcome> {
        verify_signature(self.secret.as_deref(), body, signature)?;

        let event = IngestEvent::parse(body)?;

        match self.emails.find_by_identity(&event.identity).await? {
            Some(email) => self.append(&email, &event).await,
            None if event.kind == EventKind::Sent => self.create(&event).await,
            None => {
                // Gating rule: a non-"sent" event for an unknown identity
                // would create an email with no sent_at, so it is dropped.
                info!(
                    identity = %event.identity,
                    kind = %event.kind,
                    "ignored: no_sent_event"
                );
                Ok(IngestOutcome::Ignored)
            }
        }
    }

    /// Handle the first "sent" event for an unseen identity
    async fn create(&self, event: &IngestEvent) -> Result<IngestOutcome> {
        let (campaign, campaign_created) = self
            .campaigns
            .upsert_if_absent(&event.subject, event.occurred_at.date_naive())
            .await?;

        if campaign_created {
            info!(
                subject = %campaign.subject,
                sent_date = %campaign.sent_date,
                "Created campaign message"
            );
        }

        let new_email = NewEmail {
            campaign_message_id: campaign.id,
            provider_message_id: event.identity.provider_message_id.clone(),
            recipient_address: event.identity.recipient_address.clone(),
            sent_at: event.occurred_at,
            current_status: EventKind::Sent,
        };

        match self
            .emails
            .create_with_first_event(new_email, event.event.clone())
            .await?
        {
            CreateEmailOutcome::Created(email) => {
                info!(identity = %email.identity(), "Created email");
                Ok(IngestOutcome::Accepted)
            }
            // Lost a concurrent create race for the same identity; fall
            // through to the normal append path against the winner's row.
            CreateEmailOutcome::Existing(email) => self.append(&email, event).await,
        }
    }

    /// Append an event to an existing email and recompute its status
    async fn append(&self, email: &Email, event: &IngestEvent) -> Result<IngestOutcome> {
        let inserted = self.events.append_if_absent(email.id, &event.event).await?;

        // The status write runs even when the event was already recorded:
        // a redelivery may follow a transient status-write failure, and
        // the persisted status must converge on the event set.
        let kinds = self.events.kinds_for_email(email.id).await?;
        let status = derive_status(&kinds);
        self.emails.update_status(email.id, &status).await?;

        if !inserted {
            debug!(
                identity = %email.identity(),
                kind = %event.kind,
                "Duplicate event, already recorded"
            );
            return Ok(IngestOutcome::Duplicate);
        }

        debug!(
            identity = %email.identity(),
            kind = %event.kind,
            status = %status,
            "Recorded event"
        );

        Ok(IngestOutcome::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::sign_body;
    use crate::testing::InMemoryStore;
    use mailtrack_common::types::EmailIdentity;
    use mailtrack_common::Error;
    use pretty_assertions::assert_eq;

    fn ingestor(store: &Arc<InMemoryStore>, secret: Option<&str>) -> Ingestor {
        Ingestor::new(
            store.clone(),
            store.clone(),
            store.clone(),
            secret.map(String::from),
        )
    }

    fn webhook(event: &str, message_id: &str, email: &str, ts: i64) -> Vec<u8> {
        format!(
            r#"{{"event":"{}","message-id":"{}","email":"{}","ts_event":{},"subject":"Welcome"}}"#,
            event, message_id, email, ts
        )
        .into_bytes()
    }

    async fn status_of(store: &Arc<InMemoryStore>, message_id: &str, email: &str) -> String {
        let found = store
            .find_by_identity(&EmailIdentity::new(message_id, email))
            .await
            .unwrap()
            .unwrap();
        found.current_status
    }

    #[tokio::test]
    async fn test_sent_event_creates_campaign_email_and_event() {
        let store = Arc::new(InMemoryStore::new());
        let ingestor = ingestor(&store, None);

        let outcome = ingestor
            .ingest(&webhook("request", "<m1>", "a@example.com", 1_700_000_000), None)
            .await
            .unwrap();

        assert_eq!(outcome, IngestOutcome::Accepted);
        assert_eq!(store.email_count(), 1);
        assert_eq!(store.event_count(), 1);
        assert_eq!(status_of(&store, "<m1>", "a@example.com").await, "sent");

        let campaign = store.campaign_by_subject("Welcome").unwrap();
        assert_eq!(campaign.total_sent, 1);
    }

    #[tokio::test]
    async fn test_duplicate_webhook_is_a_noop() {
        let store = Arc::new(InMemoryStore::new());
        let ingestor = ingestor(&store, None);
        let body = webhook("request", "<m1>", "a@example.com", 1_700_000_000);

        assert_eq!(
            ingestor.ingest(&body, None).await.unwrap(),
            IngestOutcome::Accepted
        );
        assert_eq!(
            ingestor.ingest(&body, None).await.unwrap(),
            IngestOutcome::Duplicate
        );
        assert_eq!(store.email_count(), 1);
        assert_eq!(store.event_count(), 1);
        assert_eq!(status_of(&store, "<m1>", "a@example.com").await, "sent");
    }

    #[tokio::test]
    async fn test_final_status_is_order_independent() {
        let deliveries = [
            ("request", 1_700_000_000),
            ("hard_bounce", 1_700_000_100),
            ("delivered", 1_700_000_200),
        ];

        let mut statuses = Vec::new();
        for order in [[0, 1, 2], [2, 1, 0], [1, 2, 0]] {
            let store = Arc::new(InMemoryStore::new());
            let ingestor = ingestor(&store, None);

            // Events gated before the "sent" event come back later via
            // the provider's at-least-once redelivery.
            let mut redeliver = Vec::new();
            for i in order {
                let (event, ts) = deliveries[i];
                let body = webhook(event, "<m1>", "a@example.com", ts);
                if ingestor.ingest(&body, None).await.unwrap() == IngestOutcome::Ignored {
                    redeliver.push(body);
                }
            }
            for body in redeliver {
                assert_eq!(
                    ingestor.ingest(&body, None).await.unwrap(),
                    IngestOutcome::Accepted
                );
            }

            statuses.push(status_of(&store, "<m1>", "a@example.com").await);
        }

        assert_eq!(statuses, vec!["delivered", "delivered", "delivered"]);
    }

    #[tokio::test]
    async fn test_gating_drops_events_for_unknown_identity() {
        let store = Arc::new(InMemoryStore::new());
        let ingestor = ingestor(&store, None);

        let outcome = ingestor
            .ingest(&webhook("delivered", "<m1>", "a@example.com", 1_700_000_100), None)
            .await
            .unwrap();

        assert_eq!(outcome, IngestOutcome::Ignored);
        assert_eq!(store.campaign_count(), 0);
        assert_eq!(store.email_count(), 0);
        assert_eq!(store.event_count(), 0);

        // The "sent" event arrives late and creates the email
        ingestor
            .ingest(&webhook("request", "<m1>", "a@example.com", 1_700_000_000), None)
            .await
            .unwrap();

        // The redelivered "delivered" event is now accepted
        let outcome = ingestor
            .ingest(&webhook("delivered", "<m1>", "a@example.com", 1_700_000_100), None)
            .await
            .unwrap();

        assert_eq!(outcome, IngestOutcome::Accepted);
        assert_eq!(status_of(&store, "<m1>", "a@example.com").await, "delivered");
    }

    #[tokio::test]
    async fn test_concurrent_sent_race_creates_one_email() {
        let store = Arc::new(InMemoryStore::new());
        let ingestor = Arc::new(ingestor(&store, None));
        let body = webhook("request", "<m1>", "a@example.com", 1_700_000_000);

        let a = {
            let ingestor = ingestor.clone();
            let body = body.clone();
            tokio::spawn(async move { ingestor.ingest(&body, None).await })
        };
        let b = {
            let ingestor = ingestor.clone();
            let body = body.clone();
            tokio::spawn(async move { ingestor.ingest(&body, None).await })
        };

        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

        assert_eq!(store.email_count(), 1);
        assert_eq!(store.event_count(), 1);
        // One request recorded the event; the other saw it as a duplicate
        let mut outcomes = [a, b];
        outcomes.sort_by_key(|o| *o == IngestOutcome::Duplicate);
        assert_eq!(outcomes, [IngestOutcome::Accepted, IngestOutcome::Duplicate]);
    }

    #[tokio::test]
    async fn test_invalid_signature_leaves_no_state() {
        let store = Arc::new(InMemoryStore::new());
        let ingestor = ingestor(&store, Some("secret"));
        let body = webhook("request", "<m1>", "a@example.com", 1_700_000_000);

        let err = ingestor.ingest(&body, Some("deadbeef")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSignature));
        assert_eq!(store.email_count(), 0);

        let sig = sign_body("secret", &body);
        assert_eq!(
            ingestor.ingest(&body, Some(&sig)).await.unwrap(),
            IngestOutcome::Accepted
        );
    }

    #[tokio::test]
    async fn test_different_recipients_are_distinct_emails() {
        let store = Arc::new(InMemoryStore::new());
        let ingestor = ingestor(&store, None);

        ingestor
            .ingest(&webhook("request", "<m1>", "a@example.com", 1_700_000_000), None)
            .await
            .unwrap();
        ingestor
            .ingest(&webhook("request", "<m1>", "b@example.com", 1_700_000_000), None)
            .await
            .unwrap();

        assert_eq!(store.email_count(), 2);
        // Same campaign, counted twice
        assert_eq!(store.campaign_count(), 1);
        let campaign = store.campaign_by_subject("Welcome").unwrap();
        assert_eq!(campaign.total_sent, 2);
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_retryable_error() {
        let store = Arc::new(InMemoryStore::new());
        let ingestor = ingestor(&store, None);
        store.set_failing(true);

        let err = ingestor
            .ingest(&webhook("request", "<m1>", "a@example.com", 1_700_000_000), None)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_redelivered_sent_does_not_bump_total_sent() {
        let store = Arc::new(InMemoryStore::new());
        let ingestor = ingestor(&store, None);

        ingestor
            .ingest(&webhook("request", "<m1>", "a@example.com", 1_700_000_000), None)
            .await
            .unwrap();

        // Identical redelivery is a no-op; a "sent" redelivery with a
        // different provider timestamp is a new event row but not a new
        // email, so the campaign counter stays put either way.
        assert_eq!(
            ingestor
                .ingest(&webhook("request", "<m1>", "a@example.com", 1_700_000_000), None)
                .await
                .unwrap(),
            IngestOutcome::Duplicate
        );
        assert_eq!(
            ingestor
                .ingest(&webhook("request", "<m1>", "a@example.com", 1_700_000_050), None)
                .await
                .unwrap(),
            IngestOutcome::Accepted
        );

        assert_eq!(store.email_count(), 1);
        assert_eq!(store.event_count(), 2);
        let campaign = store.campaign_by_subject("Welcome").unwrap();
        assert_eq!(campaign.total_sent, 1);
    }

    /// Email repository wrapper whose next status write fails once,
    /// simulating a transient outage between the event insert and the
    /// status update.
    struct FlakyStatusStore {
        inner: Arc<InMemoryStore>,
        fail_next_status: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl EmailRepositoryTrait for FlakyStatusStore {
        async fn find_by_identity(&self, identity: &EmailIdentity) -> Result<Option<Email>> {
            self.inner.find_by_identity(identity).await
        }

        async fn create_with_first_event(
            &self,
            new_email: NewEmail,
            first_event: mailtrack_storage::models::NewDeliveryEvent,
        ) -> Result<CreateEmailOutcome> {
            self.inner.create_with_first_event(new_email, first_event).await
        }

        async fn update_status(
            &self,
            id: mailtrack_common::types::EmailId,
            status: &EventKind,
        ) -> Result<()> {
            use std::sync::atomic::Ordering;
            if self.fail_next_status.swap(false, Ordering::SeqCst) {
                return Err(Error::StoreUnavailable("status write failed".to_string()));
            }
            self.inner.update_status(id, status).await
        }

        async fn list_in_range(
            &self,
            from: chrono::DateTime<chrono::Utc>,
            to: chrono::DateTime<chrono::Utc>,
            search: Option<&str>,
        ) -> Result<Vec<mailtrack_storage::models::EmailOverview>> {
            self.inner.list_in_range(from, to, search).await
        }
    }

    #[tokio::test]
    async fn test_redelivery_converges_status_after_transient_write_failure() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let store = Arc::new(InMemoryStore::new());
        let emails = Arc::new(FlakyStatusStore {
            inner: store.clone(),
            fail_next_status: AtomicBool::new(false),
        });
        let ingestor = Ingestor::new(store.clone(), emails.clone(), store.clone(), None);

        ingestor
            .ingest(&webhook("request", "<m1>", "a@example.com", 1_700_000_000), None)
            .await
            .unwrap();

        // The event lands but the status write fails; the provider gets a
        // retryable error and redelivers.
        emails.fail_next_status.store(true, Ordering::SeqCst);
        let err = ingestor
            .ingest(&webhook("delivered", "<m1>", "a@example.com", 1_700_000_100), None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(status_of(&store, "<m1>", "a@example.com").await, "sent");

        // The redelivered event is a duplicate, but the persisted status
        // must still be brought in line with the event set.
        let outcome = ingestor
            .ingest(&webhook("delivered", "<m1>", "a@example.com", 1_700_000_100), None)
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Duplicate);
        assert_eq!(status_of(&store, "<m1>", "a@example.com").await, "delivered");
    }
}
