//! In-memory repositories for tests
//!
//! A single-mutex store implementing the repository traits with the same
//! atomicity guarantees the database impls get from unique indexes and
//! `ON CONFLICT DO NOTHING`. A failure toggle simulates a backing-store
//! outage for resilience tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use mailtrack_common::types::{CampaignMessageId, EmailId, EmailIdentity, EventKind};
use mailtrack_common::{Error, Result};
use mailtrack_storage::models::{
    CampaignMessage, CreateEmailOutcome, DeliveryEvent, Email, EmailOverview, NewDeliveryEvent,
    NewEmail,
};
use mailtrack_storage::{
    CampaignMessageRepositoryTrait, DeliveryEventRepositoryTrait, EmailRepositoryTrait,
};

#[derive(Default)]
struct Inner {
    campaigns: Vec<CampaignMessage>,
    emails: Vec<Email>,
    events: Vec<DeliveryEvent>,
}

/// In-memory store implementing all three repository traits
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    failing: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated store failure; while set, every operation returns
    /// a retryable `StoreUnavailable`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(Error::StoreUnavailable("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn campaign_count(&self) -> usize {
        self.inner.lock().unwrap().campaigns.len()
    }

    pub fn email_count(&self) -> usize {
        self.inner.lock().unwrap().emails.len()
    }

    pub fn event_count(&self) -> usize {
        self.inner.lock().unwrap().events.len()
    }

    pub fn campaign_by_subject(&self, subject: &str) -> Option<CampaignMessage> {
        self.inner
            .lock()
            .unwrap()
            .campaigns
            .iter()
            .find(|c| c.subject == subject)
            .cloned()
    }

    fn build_event(email_id: EmailId, event: &NewDeliveryEvent) -> DeliveryEvent {
        DeliveryEvent {
            id: Uuid::now_v7(),
            email_id,
            kind: event.kind.as_str().to_string(),
            occurred_at: event.occurred_at,
            bounce_type: event.bounce_type.map(|b| b.as_str().to_string()),
            bounce_reason: event.bounce_reason.clone(),
            url: event.url.clone(),
            ip: event.ip.clone(),
            user_agent: event.user_agent.clone(),
            raw_payload: event.raw_payload.clone(),
            created_at: Utc::now(),
        }
    }

    fn is_duplicate(inner: &Inner, email_id: EmailId, event: &NewDeliveryEvent) -> bool {
        inner.events.iter().any(|e| {
            e.email_id == email_id
                && e.kind == event.kind.as_str()
                && e.occurred_at == event.occurred_at
        })
    }
}

#[async_trait]
impl CampaignMessageRepositoryTrait for InMemoryStore {
    async fn upsert_if_absent(
        &self,
        subject: &str,
        sent_date: NaiveDate,
    ) -> Result<(CampaignMessage, bool)> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();

        if let Some(existing) = inner
            .campaigns
            .iter()
            .find(|c| c.subject == subject && c.sent_date == sent_date)
        {
            return Ok((existing.clone(), false));
        }

        let campaign = CampaignMessage {
            id: Uuid::now_v7(),
            subject: subject.to_string(),
            sent_date,
            total_sent: 0,
            created_at: Utc::now(),
        };
        inner.campaigns.push(campaign.clone());
        Ok((campaign, true))
    }

    async fn get(&self, id: CampaignMessageId) -> Result<Option<CampaignMessage>> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.campaigns.iter().find(|c| c.id == id).cloned())
    }
}

#[async_trait]
impl EmailRepositoryTrait for InMemoryStore {
    async fn find_by_identity(&self, identity: &EmailIdentity) -> Result<Option<Email>> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .emails
            .iter()
            .find(|e| {
                e.provider_message_id == identity.provider_message_id
                    && e.recipient_address == identity.recipient_address
            })
            .cloned())
    }

    async fn create_with_first_event(
        &self,
        new_email: NewEmail,
        first_event: NewDeliveryEvent,
    ) -> Result<CreateEmailOutcome> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();

        if let Some(existing) = inner
            .emails
            .iter()
            .find(|e| {
                e.provider_message_id == new_email.provider_message_id
                    && e.recipient_address == new_email.recipient_address
            })
            .cloned()
        {
            return Ok(CreateEmailOutcome::Existing(existing));
        }

        let email = Email {
            id: Uuid::now_v7(),
            campaign_message_id: new_email.campaign_message_id,
            provider_message_id: new_email.provider_message_id,
            recipient_address: new_email.recipient_address,
            sent_at: new_email.sent_at,
            current_status: new_email.current_status.as_str().to_string(),
            created_at: Utc::now(),
        };

        if !Self::is_duplicate(&inner, email.id, &first_event) {
            let event = Self::build_event(email.id, &first_event);
            inner.events.push(event);
        }
        inner.emails.push(email.clone());

        // The campaign counter moves with the email, as in the database
        // transaction
        if let Some(campaign) = inner
            .campaigns
            .iter_mut()
            .find(|c| c.id == email.campaign_message_id)
        {
            campaign.total_sent += 1;
        }

        Ok(CreateEmailOutcome::Created(email))
    }

    async fn update_status(&self, id: EmailId, status: &EventKind) -> Result<()> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(email) = inner.emails.iter_mut().find(|e| e.id == id) {
            email.current_status = status.as_str().to_string();
        }
        Ok(())
    }

    async fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        search: Option<&str>,
    ) -> Result<Vec<EmailOverview>> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        let term = search.map(str::to_lowercase).filter(|s| !s.is_empty());

        let mut rows: Vec<EmailOverview> = inner
            .emails
            .iter()
            .filter(|e| e.sent_at >= from && e.sent_at <= to)
            .filter_map(|e| {
                let subject = inner
                    .campaigns
                    .iter()
                    .find(|c| c.id == e.campaign_message_id)
                    .map(|c| c.subject.clone())?;

                if let Some(term) = &term {
                    let matches = e.recipient_address.to_lowercase().contains(term)
                        || subject.to_lowercase().contains(term);
                    if !matches {
                        return None;
                    }
                }

                Some(EmailOverview {
                    id: e.id,
                    provider_message_id: e.provider_message_id.clone(),
                    recipient_address: e.recipient_address.clone(),
                    subject,
                    sent_at: e.sent_at,
                    current_status: e.current_status.clone(),
                })
            })
            .collect();

        rows.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(rows)
    }
}

#[async_trait]
impl DeliveryEventRepositoryTrait for InMemoryStore {
    async fn append_if_absent(&self, email_id: EmailId, event: &NewDeliveryEvent) -> Result<bool> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();

        if Self::is_duplicate(&inner, email_id, event) {
            return Ok(false);
        }

        let event = Self::build_event(email_id, event);
        inner.events.push(event);
        Ok(true)
    }

    async fn list_for_email(&self, email_id: EmailId) -> Result<Vec<DeliveryEvent>> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .events
            .iter()
            .filter(|e| e.email_id == email_id)
            .cloned()
            .collect())
    }

    async fn list_for_emails(&self, email_ids: &[EmailId]) -> Result<Vec<DeliveryEvent>> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .events
            .iter()
            .filter(|e| email_ids.contains(&e.email_id))
            .cloned()
            .collect())
    }

    async fn kinds_for_email(&self, email_id: EmailId) -> Result<Vec<EventKind>> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        let mut kinds: Vec<EventKind> = Vec::new();
        for event in inner.events.iter().filter(|e| e.email_id == email_id) {
            let kind = EventKind::parse(&event.kind);
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}
