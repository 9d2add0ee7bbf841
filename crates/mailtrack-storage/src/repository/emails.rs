//! Email repository

use crate::db::{map_db_err, DatabasePool};
use crate::models::{CreateEmailOutcome, Email, EmailOverview, NewDeliveryEvent, NewEmail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailtrack_common::types::{EmailId, EmailIdentity, EventKind};
use mailtrack_common::{Error, Result};
use uuid::Uuid;

/// Email repository trait
#[async_trait]
pub trait EmailRepository: Send + Sync {
    /// Look up an email by its external identity pair
    async fn find_by_identity(&self, identity: &EmailIdentity) -> Result<Option<Email>>;

    /// Atomically create an email together with its first event, or return
    /// the existing row when the identity is already known. An email with
    /// zero events must never be observable, and the campaign's total_sent
    /// counter moves with the email, so all three writes share one
    /// transaction.
    async fn create_with_first_event(
        &self,
        new_email: NewEmail,
        first_event: NewDeliveryEvent,
    ) -> Result<CreateEmailOutcome>;

    /// Persist a recomputed current status
    async fn update_status(&self, id: EmailId, status: &EventKind) -> Result<()>;

    /// List emails sent inside the given range, optionally filtered by a
    /// free-text search over recipient and campaign subject
    async fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        search: Option<&str>,
    ) -> Result<Vec<EmailOverview>>;
}

/// PostgreSQL email repository implementation
pub struct DbEmailRepository {
    pool: DatabasePool,
}

impl DbEmailRepository {
    /// Create a new repository
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailRepository for DbEmailRepository {
    async fn find_by_identity(&self, identity: &EmailIdentity) -> Result<Option<Email>> {
        let email = sqlx::query_as::<_, Email>(
            r#"
            SELECT * FROM emails
            WHERE provider_message_id = $1 AND recipient_address = $2
            "#,
        )
        .bind(&identity.provider_message_id)
        .bind(&identity.recipient_address)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(map_db_err)?;

        Ok(email)
    }

    async fn create_with_first_event(
        &self,
        new_email: NewEmail,
        first_event: NewDeliveryEvent,
    ) -> Result<CreateEmailOutcome> {
        let email_id = Uuid::now_v7();
        let now = chrono::Utc::now();

        let mut tx = self.pool.pool().begin().await.map_err(map_db_err)?;

        let inserted = sqlx::query_as::<_, Email>(
            r#"
            INSERT INTO emails (
                id, campaign_message_id, provider_message_id, recipient_address,
                sent_at, current_status, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (provider_message_id, recipient_address) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(email_id)
        .bind(new_email.campaign_message_id)
        .bind(&new_email.provider_message_id)
        .bind(&new_email.recipient_address)
        .bind(new_email.sent_at)
        .bind(new_email.current_status.as_str())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_err)?;

        let Some(email) = inserted else {
            // Lost the create race; hand back the winner's row so the
            // caller can append its event through the normal path.
            tx.rollback().await.map_err(map_db_err)?;

            let existing = self
                .find_by_identity(&EmailIdentity::new(
                    &new_email.provider_message_id,
                    &new_email.recipient_address,
                ))
                .await?
                .ok_or_else(|| {
                    Error::Internal("Email vanished between insert and select".to_string())
                })?;

            return Ok(CreateEmailOutcome::Existing(existing));
        };

        sqlx::query(
            r#"
            INSERT INTO delivery_events (
                id, email_id, kind, occurred_at, bounce_type, bounce_reason,
                url, ip, user_agent, raw_payload, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (email_id, kind, occurred_at) DO NOTHING
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(email.id)
        .bind(first_event.kind.as_str())
        .bind(first_event.occurred_at)
        .bind(first_event.bounce_type.map(|b| b.as_str()))
        .bind(&first_event.bounce_reason)
        .bind(&first_event.url)
        .bind(&first_event.ip)
        .bind(&first_event.user_agent)
        .bind(&first_event.raw_payload)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        sqlx::query("UPDATE campaign_messages SET total_sent = total_sent + 1 WHERE id = $1")
            .bind(email.campaign_message_id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;

        Ok(CreateEmailOutcome::Created(email))
    }

    async fn update_status(&self, id: EmailId, status: &EventKind) -> Result<()> {
        sqlx::query("UPDATE emails SET current_status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(self.pool.pool())
            .await
            .map_err(map_db_err)?;

        Ok(())
    }

    async fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        search: Option<&str>,
    ) -> Result<Vec<EmailOverview>> {
        let rows = match search {
            Some(term) if !term.is_empty() => {
                let pattern = format!("%{}%", term);
                sqlx::query_as::<_, EmailOverview>(
                    r#"
                    SELECT e.id, e.provider_message_id, e.recipient_address,
                           m.subject, e.sent_at, e.current_status
                    FROM emails e
                    JOIN campaign_messages m ON m.id = e.campaign_message_id
                    WHERE e.sent_at >= $1 AND e.sent_at <= $2
                      AND (e.recipient_address ILIKE $3 OR m.subject ILIKE $3)
                    ORDER BY e.sent_at DESC
                    "#,
                )
                .bind(from)
                .bind(to)
                .bind(pattern)
                .fetch_all(self.pool.pool())
                .await
            }
            _ => {
                sqlx::query_as::<_, EmailOverview>(
                    r#"
                    SELECT e.id, e.provider_message_id, e.recipient_address,
                           m.subject, e.sent_at, e.current_status
                    FROM emails e
                    JOIN campaign_messages m ON m.id = e.campaign_message_id
                    WHERE e.sent_at >= $1 AND e.sent_at <= $2
                    ORDER BY e.sent_at DESC
                    "#,
                )
                .bind(from)
                .bind(to)
                .fetch_all(self.pool.pool())
                .await
            }
        }
        .map_err(map_db_err)?;

        Ok(rows)
    }
}
