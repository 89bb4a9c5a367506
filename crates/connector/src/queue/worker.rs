//! Promotion queue workers.
//!
//! [`PromotionQueueBase`] carries what every promotion worker needs: the
//! commerce backend client, the product manager and the promotions manager.
//! Concrete workers add one processing step per item and never retry on
//! their own; a returned error sends the item back to the runner.
//!
//! An item only says which SKUs to look at. What happens to them follows the
//! promotion's SKU set at processing time: attach only SKUs the promotion
//! still applies to, detach only SKUs it no longer applies to.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, instrument, warn};

use commerce_connector_core::{QueueName, RouteException};

use super::QueueItem;
use crate::api::CommerceApi;
use crate::managers::{ManagerError, Outcome, ProductManager, PromotionsManager};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Upstream(#[from] RouteException),

    #[error("promotion {0} does not exist")]
    PromotionNotFound(String),

    #[error("item rejected: {0}")]
    Rejected(String),
}

/// Shared dependencies of the promotion workers.
#[derive(Clone)]
pub struct PromotionQueueBase {
    api: Arc<dyn CommerceApi>,
    products: Arc<dyn ProductManager>,
    promotions: Arc<dyn PromotionsManager>,
}

impl PromotionQueueBase {
    #[must_use]
    pub fn new(
        api: Arc<dyn CommerceApi>,
        products: Arc<dyn ProductManager>,
        promotions: Arc<dyn PromotionsManager>,
    ) -> Self {
        Self {
            api,
            products,
            promotions,
        }
    }

    #[must_use]
    pub fn api(&self) -> &dyn CommerceApi {
        self.api.as_ref()
    }

    #[must_use]
    pub fn products(&self) -> &dyn ProductManager {
        self.products.as_ref()
    }

    /// Split the item's SKUs into those the promotion currently applies to
    /// and the rest. `None` if the promotion does not exist.
    async fn partition(
        &self,
        item: &QueueItem,
    ) -> Result<Option<(Vec<String>, Vec<String>)>, WorkerError> {
        let Some(desired) = self.promotions.desired_skus(&item.payload.rule_id).await? else {
            return Ok(None);
        };
        Ok(Some(
            item.payload
                .skus
                .iter()
                .cloned()
                .partition(|sku| desired.contains(sku)),
        ))
    }

    /// Ask the backend to push the item's SKUs again so their promotion
    /// data is refreshed.
    async fn request_resync(&self, item: &QueueItem) -> Result<(), WorkerError> {
        let store = item.payload.store();
        if store.is_unspecified() {
            warn!(id = %item.id, "Queue item names no store, skipping product resync");
            return Ok(());
        }
        self.api.request_product_sync(&store, &item.payload.skus).await?;
        Ok(())
    }
}

/// One processing step for items of a single queue.
#[async_trait]
pub trait PromotionQueueWorker: Send + Sync {
    fn queue(&self) -> QueueName;

    /// Process one item. Must be safe to replay.
    async fn process_item(&self, item: &QueueItem) -> Result<(), WorkerError>;
}

/// Attaches a promotion to those of the item's SKUs it still applies to.
#[derive(Clone)]
pub struct AttachPromotionWorker {
    base: PromotionQueueBase,
}

impl AttachPromotionWorker {
    #[must_use]
    pub const fn new(base: PromotionQueueBase) -> Self {
        Self { base }
    }
}

#[async_trait]
impl PromotionQueueWorker for AttachPromotionWorker {
    fn queue(&self) -> QueueName {
        QueueName::Attach
    }

    #[instrument(skip(self, item), fields(id = %item.id, rule_id = %item.payload.rule_id))]
    async fn process_item(&self, item: &QueueItem) -> Result<(), WorkerError> {
        let payload = &item.payload;
        if payload.skus.is_empty() {
            return Ok(());
        }

        let Some((applicable, _)) = self.base.partition(item).await? else {
            return Err(WorkerError::PromotionNotFound(payload.rule_id.clone()));
        };
        if applicable.is_empty() {
            info!(requested = payload.skus.len(), "Promotion no longer applies to these SKUs");
            return Ok(());
        }

        match self
            .base
            .products()
            .attach_promotion(&payload.rule_id, &applicable)
            .await?
        {
            Outcome::Done(attached) => {
                info!(attached, requested = payload.skus.len(), "Promotion attached");
            }
            Outcome::NotFound => {
                return Err(WorkerError::PromotionNotFound(payload.rule_id.clone()));
            }
            Outcome::Invalid(reason) => return Err(WorkerError::Rejected(reason)),
        }

        self.base.request_resync(item).await
    }
}

/// Removes a promotion from those of the item's SKUs it no longer applies to.
#[derive(Clone)]
pub struct DetachPromotionWorker {
    base: PromotionQueueBase,
}

impl DetachPromotionWorker {
    #[must_use]
    pub const fn new(base: PromotionQueueBase) -> Self {
        Self { base }
    }
}

#[async_trait]
impl PromotionQueueWorker for DetachPromotionWorker {
    fn queue(&self) -> QueueName {
        QueueName::Detach
    }

    #[instrument(skip(self, item), fields(id = %item.id, rule_id = %item.payload.rule_id))]
    async fn process_item(&self, item: &QueueItem) -> Result<(), WorkerError> {
        let payload = &item.payload;
        if payload.skus.is_empty() {
            return Ok(());
        }

        // A deleted promotion applies to nothing.
        let stale = match self.base.partition(item).await? {
            Some((_, stale)) => stale,
            None => payload.skus.clone(),
        };
        if stale.is_empty() {
            info!(requested = payload.skus.len(), "Promotion applies to these SKUs again");
            return Ok(());
        }

        let detached = self
            .base
            .products()
            .detach_promotion(&payload.rule_id, &stale)
            .await?;
        info!(detached, requested = payload.skus.len(), "Promotion detached");

        self.base.request_resync(item).await
    }
}
