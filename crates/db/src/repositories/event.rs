use async_trait::async_trait;

use vitrine_core::events::{ChatEvent, EventSink, SinkError};

use super::RepositoryError;
use crate::DbPool;

pub struct SqlEventSink {
    pool: DbPool,
}

impl SqlEventSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Inserts the whole batch in one transaction: either every event lands or
    /// none does.
    pub async fn insert_batch(&self, events: &[ChatEvent]) -> Result<usize, RepositoryError> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for event in events {
            let meta = serde_json::to_string(&event.meta)
                .map_err(|err| RepositoryError::Encode(err.to_string()))?;
            sqlx::query(
                "INSERT INTO chat_events (session_id, event_name, page_url, referrer, user_agent,
                                          tz, lang, meta, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&event.session_id)
            .bind(event.event_name.as_str())
            .bind(&event.page_url)
            .bind(&event.referrer)
            .bind(&event.user_agent)
            .bind(&event.timezone)
            .bind(&event.language)
            .bind(meta)
            .bind(event.received_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(events.len())
    }
}

#[async_trait]
impl EventSink for SqlEventSink {
    async fn record(&self, events: &[ChatEvent]) -> Result<usize, SinkError> {
        self.insert_batch(events).await.map_err(|err| {
            tracing::warn!(
                event_name = "events.persist_failed",
                batch_size = events.len(),
                error = %err,
                "failed to persist widget events"
            );
            SinkError::Unavailable(err.to_string())
        })
    }
}
