//! Delivery event repository

use crate::db::{map_db_err, DatabasePool};
use crate::models::{DeliveryEvent, NewDeliveryEvent};
use async_trait::async_trait;
use mailtrack_common::types::{EmailId, EventKind};
use mailtrack_common::Result;
use sqlx::Row;
use uuid::Uuid;

/// Delivery event repository trait
#[async_trait]
pub trait DeliveryEventRepository: Send + Sync {
    /// Append an event unless an identical (email, kind, occurred_at) row
    /// already exists. Returns whether a row was inserted; a duplicate is
    /// the expected idempotent-replay outcome, not an error.
    async fn append_if_absent(&self, email_id: EmailId, event: &NewDeliveryEvent) -> Result<bool>;

    /// Full event log for one email, in insertion order
    async fn list_for_email(&self, email_id: EmailId) -> Result<Vec<DeliveryEvent>>;

    /// Event logs for a set of emails, for aggregate reads
    async fn list_for_emails(&self, email_ids: &[EmailId]) -> Result<Vec<DeliveryEvent>>;

    /// Distinct event kinds present for one email. The status deriver only
    /// needs the set, not the sequence.
    async fn kinds_for_email(&self, email_id: EmailId) -> Result<Vec<EventKind>>;
}

/// PostgreSQL delivery event repository implementation
pub struct DbDeliveryEventRepository {
    pool: DatabasePool,
}

impl DbDeliveryEventRepository {
    /// Create a new repository
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryEventRepository for DbDeliveryEventRepository {
    async fn append_if_absent(&self, email_id: EmailId, event: &NewDeliveryEvent) -> Result<bool> {
        // The unique index on (email_id, kind, occurred_at) makes the
        // check-and-insert a single atomic statement.
        let result = sqlx::query(
            r#"
            INSERT INTO delivery_events (
                id, email_id, kind, occurred_at, bounce_type, bounce_reason,
                url, ip, user_agent, raw_payload, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (email_id, kind, occurred_at) DO NOTHING
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(email_id)
        .bind(event.kind.as_str())
        .bind(event.occurred_at)
        .bind(event.bounce_type.map(|b| b.as_str()))
        .bind(&event.bounce_reason)
        .bind(&event.url)
        .bind(&event.ip)
        .bind(&event.user_agent)
        .bind(&event.raw_payload)
        .bind(chrono::Utc::now())
        .execute(self.pool.pool())
        .await
        .map_err(map_db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_email(&self, email_id: EmailId) -> Result<Vec<DeliveryEvent>> {
        let events = sqlx::query_as::<_, DeliveryEvent>(
            r#"
            SELECT * FROM delivery_events
            WHERE email_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(email_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(map_db_err)?;

        Ok(events)
    }

    async fn list_for_emails(&self, email_ids: &[EmailId]) -> Result<Vec<DeliveryEvent>> {
        if email_ids.is_empty() {
            return Ok(Vec::new());
        }

        let events = sqlx::query_as::<_, DeliveryEvent>(
            r#"
            SELECT * FROM delivery_events
            WHERE email_id = ANY($1)
            ORDER BY created_at, id
            "#,
        )
        .bind(email_ids)
        .fetch_all(self.pool.pool())
        .await
        .map_err(map_db_err)?;

        Ok(events)
    }

    async fn kinds_for_email(&self, email_id: EmailId) -> Result<Vec<EventKind>> {
        let rows = sqlx::query("SELECT DISTINCT kind FROM delivery_events WHERE email_id = $1")
            .bind(email_id)
            .fetch_all(self.pool.pool())
            .await
            .map_err(map_db_err)?;

        Ok(rows
            .into_iter()
            .map(|row| EventKind::parse(row.get::<&str, _>("kind")))
            .collect())
    }
}
