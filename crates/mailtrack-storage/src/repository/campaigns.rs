//! Campaign message repository

use crate::db::{map_db_err, DatabasePool};
use crate::models::CampaignMessage;
use async_trait::async_trait;
use chrono::NaiveDate;
use mailtrack_common::types::CampaignMessageId;
use mailtrack_common::{Error, Result};
use uuid::Uuid;

/// Campaign message repository trait
#[async_trait]
pub trait CampaignMessageRepository: Send + Sync {
    /// Atomically fetch or create the campaign keyed by (subject, sent_date).
    /// Returns the row and whether it was created by this call. Concurrent
    /// calls for the same key must converge on a single row.
    async fn upsert_if_absent(
        &self,
        subject: &str,
        sent_date: NaiveDate,
    ) -> Result<(CampaignMessage, bool)>;

    /// Get a campaign message by id
    async fn get(&self, id: CampaignMessageId) -> Result<Option<CampaignMessage>>;
}

/// PostgreSQL campaign message repository implementation
pub struct DbCampaignMessageRepository {
    pool: DatabasePool,
}

impl DbCampaignMessageRepository {
    /// Create a new repository
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignMessageRepository for DbCampaignMessageRepository {
    async fn upsert_if_absent(
        &self,
        subject: &str,
        sent_date: NaiveDate,
    ) -> Result<(CampaignMessage, bool)> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now();

        // ON CONFLICT DO NOTHING returns no row for the loser of a race,
        // so a follow-up select resolves the winner's row.
        let inserted = sqlx::query_as::<_, CampaignMessage>(
            r#"
            INSERT INTO campaign_messages (id, subject, sent_date, total_sent, created_at)
            VALUES ($1, $2, $3, 0, $4)
            ON CONFLICT (subject, sent_date) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(subject)
        .bind(sent_date)
        .bind(now)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(map_db_err)?;

        if let Some(campaign) = inserted {
            return Ok((campaign, true));
        }

        let existing = sqlx::query_as::<_, CampaignMessage>(
            "SELECT * FROM campaign_messages WHERE subject = $1 AND sent_date = $2",
        )
        .bind(subject)
        .bind(sent_date)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(map_db_err)?
        .ok_or_else(|| {
            Error::Internal("Campaign vanished between insert and select".to_string())
        })?;

        Ok((existing, false))
    }

    async fn get(&self, id: CampaignMessageId) -> Result<Option<CampaignMessage>> {
        let campaign =
            sqlx::query_as::<_, CampaignMessage>("SELECT * FROM campaign_messages WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.pool())
                .await
                .map_err(map_db_err)?;

        Ok(campaign)
    }
}
