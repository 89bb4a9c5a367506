//! Promotion queues.
//!
//! Promotion sync does not touch products directly. The promotions manager
//! stores each promotion's SKU set together with the attach/detach items for
//! what changed; the [`QueueRunner`] hands them to the matching
//! [`PromotionQueueWorker`]. Workers reconcile against the promotion's
//! current SKU set, so the order items are processed in does not matter.
//!
//! Delivery is at-least-once: a claimed item whose worker fails is released
//! for redelivery until it runs out of attempts, and a lease lets a crashed
//! runner's claims expire.

mod runner;
mod worker;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use commerce_connector_core::{QueueItemId, QueueItemState, QueueName, StoreUuid};

use crate::db::RepositoryError;

pub use runner::{QueueRunner, RunSummary};
pub use worker::{
    AttachPromotionWorker, DetachPromotionWorker, PromotionQueueBase, PromotionQueueWorker,
    WorkerError,
};

/// Most SKUs carried by one queue item.
pub const MAX_SKUS_PER_ITEM: usize = 50;

/// Work carried by a promotion queue item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionQueuePayload {
    pub rule_id: String,
    pub skus: Vec<String>,
    /// Store whose products are re-pushed once the item is processed.
    #[serde(default)]
    pub acm_uuid: String,
}

impl PromotionQueuePayload {
    /// Split a SKU list into payloads of at most [`MAX_SKUS_PER_ITEM`] SKUs.
    #[must_use]
    pub fn chunked(rule_id: &str, store: &StoreUuid, skus: &[String]) -> Vec<Self> {
        skus.chunks(MAX_SKUS_PER_ITEM)
            .map(|chunk| Self {
                rule_id: rule_id.to_owned(),
                skus: chunk.to_vec(),
                acm_uuid: store.as_str().to_owned(),
            })
            .collect()
    }

    #[must_use]
    pub fn store(&self) -> StoreUuid {
        StoreUuid::new(self.acm_uuid.as_str())
    }
}

/// A claimed (or inspected) queue item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub id: QueueItemId,
    pub queue: QueueName,
    pub payload: PromotionQueuePayload,
    /// Deliveries so far, including the current one.
    pub attempts: u32,
    pub state: QueueItemState,
    pub last_error: Option<String>,
    pub available_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("invalid queue payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("queue item {0} not found")]
    NotFound(QueueItemId),

    #[error("queue unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Storage for promotion queue items.
#[async_trait]
pub trait PromotionQueue: Send + Sync {
    async fn enqueue(
        &self,
        queue: QueueName,
        payload: &PromotionQueuePayload,
    ) -> Result<QueueItemId, QueueError>;

    /// Claim up to `limit` deliverable items, oldest first. Claiming counts
    /// as an attempt and hides the item for `lease`.
    async fn claim(
        &self,
        queue: QueueName,
        limit: u32,
        lease: Duration,
    ) -> Result<Vec<QueueItem>, QueueError>;

    /// Remove a processed item.
    async fn complete(&self, id: QueueItemId) -> Result<(), QueueError>;

    /// Make a claimed item deliverable again.
    async fn release(&self, id: QueueItemId, error: &str) -> Result<(), QueueError>;

    /// Stop delivering an item.
    async fn fail(&self, id: QueueItemId, error: &str) -> Result<(), QueueError>;

    /// Items of a queue that may still be delivered.
    async fn pending(&self, queue: QueueName) -> Result<Vec<QueueItem>, QueueError>;
}
