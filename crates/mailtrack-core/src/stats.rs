//! Stats aggregation (read path)
//!
//! Computes dashboard aggregates, listing views, and single-email detail
//! from the event store, behind a read-through cache. When the backing
//! store is unreachable the last successfully cached value for the same
//! key is served instead, flagged stale; only a cold cache surfaces the
//! failure.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use mailtrack_common::types::{EmailId, EmailIdentity, EventKind, Freshness, TimeWindow};
use mailtrack_common::{Error, Result};
use mailtrack_storage::models::{DeliveryEvent, EmailOverview};
use mailtrack_storage::{
    CampaignMessageRepositoryTrait, DeliveryEventRepositoryTrait, EmailRepositoryTrait,
};

use crate::cache::CacheService;
use crate::status::derive_status;

/// Dashboard-level aggregates for one window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_sent: i64,
    pub delivered: i64,
    pub bounced: i64,
    pub opened: i64,
    pub clicked: i64,
    pub delivery_rate: f64,
    pub bounce_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
    /// Clicks as a share of opens; 0.0 when nothing was opened
    pub click_to_open_rate: f64,
    /// Mean seconds from sent to delivered, over emails that have a
    /// delivered event; 0.0 when none have
    pub avg_delivery_seconds: f64,
}

impl DashboardStats {
    fn empty() -> Self {
        Self {
            total_sent: 0,
            delivered: 0,
            bounced: 0,
            opened: 0,
            clicked: 0,
            delivery_rate: 0.0,
            bounce_rate: 0.0,
            open_rate: 0.0,
            click_rate: 0.0,
            click_to_open_rate: 0.0,
            avg_delivery_seconds: 0.0,
        }
    }
}

/// One email in a listing view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailSummary {
    pub provider_message_id: String,
    pub recipient_address: String,
    pub subject: String,
    pub sent_at: DateTime<Utc>,
    /// Lifetime status of the email, not restricted to the query window
    pub current_status: String,
}

impl From<EmailOverview> for EmailSummary {
    fn from(row: EmailOverview) -> Self {
        Self {
            provider_message_id: row.provider_message_id,
            recipient_address: row.recipient_address,
            subject: row.subject,
            sent_at: row.sent_at,
            current_status: row.current_status,
        }
    }
}

/// Single email with its full event timeline
#[derive(Debug, Clone, Serialize)]
pub struct EmailDetail {
    pub provider_message_id: String,
    pub recipient_address: String,
    pub subject: String,
    pub sent_at: DateTime<Utc>,
    pub current_status: String,
    pub events: Vec<DeliveryEvent>,
}

/// A read-path result together with its freshness
#[derive(Debug, Clone)]
pub struct Queried<T> {
    pub value: T,
    pub freshness: Freshness,
}

impl<T> Queried<T> {
    fn live(value: T) -> Self {
        Self {
            value,
            freshness: Freshness::Live,
        }
    }

    fn stale(value: T) -> Self {
        Self {
            value,
            freshness: Freshness::Stale,
        }
    }
}

/// Cache key per query shape
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Dashboard { window: String },
    EmailList { window: String, search: String },
    EmailDetail { identity: EmailIdentity },
}

#[derive(Clone)]
enum CachedValue {
    Dashboard(DashboardStats),
    EmailList(Vec<EmailSummary>),
    EmailDetail(EmailDetail),
}

/// Read-side aggregation service
pub struct StatsService {
    campaigns: Arc<dyn CampaignMessageRepositoryTrait>,
    emails: Arc<dyn EmailRepositoryTrait>,
    events: Arc<dyn DeliveryEventRepositoryTrait>,
    cache: CacheService<CacheKey, CachedValue>,
}

impl StatsService {
    /// Create a new stats service with the given cache time-to-live
    pub fn new(
        campaigns: Arc<dyn CampaignMessageRepositoryTrait>,
        emails: Arc<dyn EmailRepositoryTrait>,
        events: Arc<dyn DeliveryEventRepositoryTrait>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            campaigns,
            emails,
            events,
            cache: CacheService::new(cache_ttl),
        }
    }

    /// Dashboard aggregates for a window
    pub async fn dashboard_stats(&self, window: &TimeWindow) -> Result<Queried<DashboardStats>> {
        let key = CacheKey::Dashboard {
            window: window.cache_fragment(),
        };

        if let Some(CachedValue::Dashboard(stats)) = self.cache.get_fresh(&key).await {
            return Ok(Queried::live(stats));
        }

        match self.compute_dashboard(window).await {
            Ok(stats) => {
                self.cache
                    .insert(key, CachedValue::Dashboard(stats.clone()))
                    .await;
                Ok(Queried::live(stats))
            }
            Err(e) => self.stale_or(&key, e).await.map(|value| match value {
                CachedValue::Dashboard(stats) => Queried::stale(stats),
                _ => unreachable!("dashboard key holds dashboard values"),
            }),
        }
    }

    /// Listing view for a window and optional search term
    pub async fn list_emails(
        &self,
        window: &TimeWindow,
        search: Option<&str>,
    ) -> Result<Queried<Vec<EmailSummary>>> {
        let key = CacheKey::EmailList {
            window: window.cache_fragment(),
            search: search.unwrap_or_default().to_string(),
        };

        if let Some(CachedValue::EmailList(list)) = self.cache.get_fresh(&key).await {
            return Ok(Queried::live(list));
        }

        match self.compute_list(window, search).await {
            Ok(list) => {
                self.cache
                    .insert(key, CachedValue::EmailList(list.clone()))
                    .await;
                Ok(Queried::live(list))
            }
            Err(e) => self.stale_or(&key, e).await.map(|value| match value {
                CachedValue::EmailList(list) => Queried::stale(list),
                _ => unreachable!("list key holds list values"),
            }),
        }
    }

    /// Single email with its full event timeline
    pub async fn email_detail(&self, identity: &EmailIdentity) -> Result<Queried<EmailDetail>> {
        let key = CacheKey::EmailDetail {
            identity: identity.clone(),
        };

        if let Some(CachedValue::EmailDetail(detail)) = self.cache.get_fresh(&key).await {
            return Ok(Queried::live(detail));
        }

        match self.compute_detail(identity).await {
            Ok(detail) => {
                self.cache
                    .insert(key, CachedValue::EmailDetail(detail.clone()))
                    .await;
                Ok(Queried::live(detail))
            }
            // NotFound is a definitive answer, not an outage
            Err(e @ Error::NotFound(_)) => Err(e),
            Err(e) => self.stale_or(&key, e).await.map(|value| match value {
                CachedValue::EmailDetail(detail) => Queried::stale(detail),
                _ => unreachable!("detail key holds detail values"),
            }),
        }
    }

    /// On a recomputation failure, serve the last cached value for the
    /// same key when one exists; otherwise surface the failure.
    async fn stale_or(&self, key: &CacheKey, error: Error) -> Result<CachedValue> {
        warn!(error = %error, "Stats recomputation failed, trying cache fallback");

        match self.cache.get_any(key).await {
            Some(value) => Ok(value),
            None => Err(error),
        }
    }

    async fn compute_dashboard(&self, window: &TimeWindow) -> Result<DashboardStats> {
        let (from, to) = window.bounds(Utc::now());
        let emails = self.emails.list_in_range(from, to, None).await?;

        if emails.is_empty() {
            return Ok(DashboardStats::empty());
        }

        let ids: Vec<EmailId> = emails.iter().map(|e| e.id).collect();
        let events = self.events.list_for_emails(&ids).await?;

        let mut kinds_by_email: HashMap<EmailId, Vec<EventKind>> = HashMap::new();
        let mut delivered_at: HashMap<EmailId, DateTime<Utc>> = HashMap::new();
        for event in &events {
            let kind = event.kind();
            if kind == EventKind::Delivered {
                delivered_at
                    .entry(event.email_id)
                    .and_modify(|at| *at = (*at).min(event.occurred_at))
                    .or_insert(event.occurred_at);
            }
            kinds_by_email.entry(event.email_id).or_default().push(kind);
        }

        let total_sent = emails.len() as i64;
        let mut delivered = 0i64;
        let mut bounced = 0i64;
        let mut opened = 0i64;
        let mut clicked = 0i64;
        let mut delivery_seconds = Vec::new();

        for email in &emails {
            let kinds = kinds_by_email.get(&email.id).map(Vec::as_slice).unwrap_or(&[]);
            if kinds.contains(&EventKind::Delivered) {
                delivered += 1;
            }
            if kinds.contains(&EventKind::Bounced) {
                bounced += 1;
            }
            if kinds.contains(&EventKind::Opened) {
                opened += 1;
            }
            if kinds.contains(&EventKind::Clicked) {
                clicked += 1;
            }
            if let Some(at) = delivered_at.get(&email.id) {
                delivery_seconds.push((*at - email.sent_at).num_milliseconds() as f64 / 1000.0);
            }
        }

        let rate = |count: i64| count as f64 / total_sent as f64 * 100.0;
        let click_to_open_rate = if opened == 0 {
            0.0
        } else {
            clicked as f64 / opened as f64 * 100.0
        };
        let avg_delivery_seconds = if delivery_seconds.is_empty() {
            0.0
        } else {
            delivery_seconds.iter().sum::<f64>() / delivery_seconds.len() as f64
        };

        Ok(DashboardStats {
            total_sent,
            delivered,
            bounced,
            opened,
            clicked,
            delivery_rate: rate(delivered),
            bounce_rate: rate(bounced),
            open_rate: rate(opened),
            click_rate: rate(clicked),
            click_to_open_rate,
            avg_delivery_seconds,
        })
    }

    async fn compute_list(
        &self,
        window: &TimeWindow,
        search: Option<&str>,
    ) -> Result<Vec<EmailSummary>> {
        let (from, to) = window.bounds(Utc::now());
        let rows = self.emails.list_in_range(from, to, search).await?;
        Ok(rows.into_iter().map(EmailSummary::from).collect())
    }

    async fn compute_detail(&self, identity: &EmailIdentity) -> Result<EmailDetail> {
        let email = self
            .emails
            .find_by_identity(identity)
            .await?
            .ok_or_else(|| Error::NotFound(format!("email {}", identity)))?;

        let events = self.events.list_for_email(email.id).await?;
        let subject = self
            .campaigns
            .get(email.campaign_message_id)
            .await?
            .map(|c| c.subject)
            .unwrap_or_default();

        // The persisted status and the event set must agree; recomputing
        // here keeps the detail view authoritative even mid-ingest.
        let kinds: Vec<EventKind> = events.iter().map(DeliveryEvent::kind).collect();
        let current_status = derive_status(&kinds).as_str().to_string();

        Ok(EmailDetail {
            provider_message_id: email.provider_message_id,
            recipient_address: email.recipient_address,
            subject,
            sent_at: email.sent_at,
            current_status,
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Ingestor;
    use crate::testing::InMemoryStore;
    use pretty_assertions::assert_eq;

    fn service(store: &Arc<InMemoryStore>, ttl: Duration) -> StatsService {
        StatsService::new(store.clone(), store.clone(), store.clone(), ttl)
    }

    async fn seed(store: &Arc<InMemoryStore>) {
        let ingestor = Ingestor::new(store.clone(), store.clone(), store.clone(), None);
        let base = Utc::now().timestamp() - 3600;

        let deliveries = [
            // e1: delivered after 60s
            ("request", "<m1>", "a@example.com", base),
            ("delivered", "<m1>", "a@example.com", base + 60),
            // e2: delivered after 120s, then opened and clicked
            ("request", "<m2>", "b@example.com", base),
            ("delivered", "<m2>", "b@example.com", base + 120),
            ("opened", "<m2>", "b@example.com", base + 200),
            ("click", "<m2>", "b@example.com", base + 300),
            // e3: bounced
            ("request", "<m3>", "c@example.com", base),
            ("hard_bounce", "<m3>", "c@example.com", base + 30),
            // e4: sent only
            ("request", "<m4>", "d@example.com", base),
        ];

        for (event, message_id, email, ts) in deliveries {
            let body = format!(
                r#"{{"event":"{}","message-id":"{}","email":"{}","ts_event":{},"subject":"Welcome"}}"#,
                event, message_id, email, ts
            );
            ingestor.ingest(body.as_bytes(), None).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_zero_emails_yield_zero_stats() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(&store, Duration::from_secs(60));

        let result = service
            .dashboard_stats(&TimeWindow::Last7Days)
            .await
            .unwrap();

        assert_eq!(result.freshness, Freshness::Live);
        assert_eq!(result.value, DashboardStats::empty());
    }

    #[tokio::test]
    async fn test_dashboard_counts_and_rates() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store).await;
        let service = service(&store, Duration::from_secs(60));

        let stats = service
            .dashboard_stats(&TimeWindow::Last7Days)
            .await
            .unwrap()
            .value;

        assert_eq!(stats.total_sent, 4);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.bounced, 1);
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.clicked, 1);
        assert_eq!(stats.delivery_rate, 50.0);
        assert_eq!(stats.bounce_rate, 25.0);
        assert_eq!(stats.open_rate, 25.0);
        assert_eq!(stats.click_rate, 25.0);
        assert_eq!(stats.click_to_open_rate, 100.0);
        assert_eq!(stats.avg_delivery_seconds, 90.0);
    }

    #[tokio::test]
    async fn test_fresh_cache_serves_during_outage() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store).await;
        let service = service(&store, Duration::from_secs(60));

        let first = service
            .dashboard_stats(&TimeWindow::Last7Days)
            .await
            .unwrap();

        // Within the TTL the cached value answers without touching the store
        store.set_failing(true);
        let second = service
            .dashboard_stats(&TimeWindow::Last7Days)
            .await
            .unwrap();

        assert_eq!(second.freshness, Freshness::Live);
        assert_eq!(second.value, first.value);
    }

    #[tokio::test]
    async fn test_stale_fallback_after_expiry() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store).await;
        // Zero TTL: every entry is expired the moment it is written
        let service = service(&store, Duration::ZERO);

        let first = service
            .dashboard_stats(&TimeWindow::Last7Days)
            .await
            .unwrap();
        assert_eq!(first.freshness, Freshness::Live);

        store.set_failing(true);
        let fallback = service
            .dashboard_stats(&TimeWindow::Last7Days)
            .await
            .unwrap();

        assert_eq!(fallback.freshness, Freshness::Stale);
        assert_eq!(fallback.value, first.value);
    }

    #[tokio::test]
    async fn test_unavailable_when_cache_is_cold() {
        let store = Arc::new(InMemoryStore::new());
        store.set_failing(true);
        let service = service(&store, Duration::from_secs(60));

        let err = service
            .dashboard_stats(&TimeWindow::Last7Days)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_cache_keys_are_per_window_and_search() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store).await;
        let service = service(&store, Duration::from_secs(60));

        service
            .dashboard_stats(&TimeWindow::Last7Days)
            .await
            .unwrap();

        store.set_failing(true);
        // A different window has no cached value to fall back on
        let err = service
            .dashboard_stats(&TimeWindow::Last24Hours)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_list_emails_with_search() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store).await;
        let service = service(&store, Duration::from_secs(60));

        let all = service
            .list_emails(&TimeWindow::Last7Days, None)
            .await
            .unwrap()
            .value;
        assert_eq!(all.len(), 4);

        let filtered = service
            .list_emails(&TimeWindow::Last7Days, Some("b@example.com"))
            .await
            .unwrap()
            .value;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].current_status, "clicked");
        assert_eq!(filtered[0].subject, "Welcome");
    }

    #[tokio::test]
    async fn test_email_detail_timeline() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store).await;
        let service = service(&store, Duration::from_secs(60));

        let detail = service
            .email_detail(&EmailIdentity::new("<m2>", "b@example.com"))
            .await
            .unwrap()
            .value;

        assert_eq!(detail.subject, "Welcome");
        assert_eq!(detail.current_status, "clicked");
        assert_eq!(detail.events.len(), 4);

        let err = service
            .email_detail(&EmailIdentity::new("<missing>", "x@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_detail_stale_fallback() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store).await;
        let service = service(&store, Duration::ZERO);
        let identity = EmailIdentity::new("<m1>", "a@example.com");

        let first = service.email_detail(&identity).await.unwrap();
        store.set_failing(true);

        let fallback = service.email_detail(&identity).await.unwrap();
        assert_eq!(fallback.freshness, Freshness::Stale);
        assert_eq!(fallback.value.current_status, first.value.current_status);
    }
}
