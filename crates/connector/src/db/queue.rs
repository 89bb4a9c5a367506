//! Promotion queue storage.
//!
//! Claims lock rows with `FOR UPDATE SKIP LOCKED`, so concurrent runners
//! (the server's background task and the CLI) never take the same item.
//! A claim pushes `available_at` forward by the lease; an item whose runner
//! died becomes deliverable again once the lease expires.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgExecutor, PgPool};
use tracing::{instrument, warn};

use commerce_connector_core::{QueueItemId, QueueItemState, QueueName};

use crate::queue::{PromotionQueue, PromotionQueuePayload, QueueError, QueueItem};

#[derive(FromRow)]
struct QueueRow {
    id: i64,
    queue: QueueName,
    payload: serde_json::Value,
    attempts: i32,
    state: QueueItemState,
    last_error: Option<String>,
    available_at: DateTime<Utc>,
}

impl QueueRow {
    fn into_item(self) -> Result<QueueItem, (QueueItemId, serde_json::Error)> {
        let id = QueueItemId::new(self.id);
        let payload = serde_json::from_value(self.payload).map_err(|e| (id, e))?;
        Ok(QueueItem {
            id,
            queue: self.queue,
            payload,
            attempts: u32::try_from(self.attempts).unwrap_or_default(),
            state: self.state,
            last_error: self.last_error,
            available_at: self.available_at,
        })
    }
}

/// Insert one pending item. Takes any executor so promotion changes can
/// write their queue work inside their own transaction.
pub(super) async fn insert_item<'e, E>(
    executor: E,
    queue: QueueName,
    payload: &PromotionQueuePayload,
) -> Result<QueueItemId, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO connector.promotion_queue (queue, payload) VALUES ($1, $2) RETURNING id",
    )
    .bind(queue)
    .bind(Json(payload))
    .fetch_one(executor)
    .await?;

    Ok(QueueItemId::new(id))
}

/// Postgres-backed [`PromotionQueue`].
#[derive(Debug, Clone)]
pub struct PgPromotionQueue {
    pool: PgPool,
}

impl PgPromotionQueue {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn set_state(
        &self,
        id: QueueItemId,
        state: QueueItemState,
        error: &str,
    ) -> Result<(), QueueError> {
        let result = sqlx::query(
            r"
            UPDATE connector.promotion_queue
            SET state = $2, last_error = $3, available_at = NOW(), updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id.as_i64())
        .bind(state)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl PromotionQueue for PgPromotionQueue {
    #[instrument(skip(self, payload), fields(rule_id = %payload.rule_id))]
    async fn enqueue(
        &self,
        queue: QueueName,
        payload: &PromotionQueuePayload,
    ) -> Result<QueueItemId, QueueError> {
        Ok(insert_item(&self.pool, queue, payload).await?)
    }

    #[instrument(skip(self))]
    async fn claim(
        &self,
        queue: QueueName,
        limit: u32,
        lease: Duration,
    ) -> Result<Vec<QueueItem>, QueueError> {
        let rows: Vec<QueueRow> = sqlx::query_as(
            r"
            WITH next AS (
                SELECT id FROM connector.promotion_queue
                WHERE queue = $1 AND state <> 'failed' AND available_at <= NOW()
                ORDER BY available_at, id
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE connector.promotion_queue q
            SET state = 'claimed',
                attempts = q.attempts + 1,
                available_at = NOW() + make_interval(secs => $3),
                updated_at = NOW()
            FROM next
            WHERE q.id = next.id
            RETURNING q.id, q.queue, q.payload, q.attempts, q.state, q.last_error, q.available_at
            ",
        )
        .bind(queue)
        .bind(i64::from(limit))
        .bind(lease.as_secs_f64())
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_item() {
                Ok(item) => items.push(item),
                Err((id, e)) => {
                    warn!(%id, error = %e, "Undecodable queue payload, marking failed");
                    self.fail(id, &format!("invalid payload: {e}")).await?;
                }
            }
        }
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    async fn complete(&self, id: QueueItemId) -> Result<(), QueueError> {
        let result = sqlx::query("DELETE FROM connector.promotion_queue WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound(id));
        }
        Ok(())
    }

    async fn release(&self, id: QueueItemId, error: &str) -> Result<(), QueueError> {
        self.set_state(id, QueueItemState::Pending, error).await
    }

    async fn fail(&self, id: QueueItemId, error: &str) -> Result<(), QueueError> {
        self.set_state(id, QueueItemState::Failed, error).await
    }

    async fn pending(&self, queue: QueueName) -> Result<Vec<QueueItem>, QueueError> {
        let rows: Vec<QueueRow> = sqlx::query_as(
            r"
            SELECT id, queue, payload, attempts, state, last_error, available_at
            FROM connector.promotion_queue
            WHERE queue = $1 AND state <> 'failed'
            ORDER BY id
            ",
        )
        .bind(queue)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| row.into_item().map_err(|(_, e)| QueueError::Payload(e)))
            .collect()
    }
}
