//! Persistence-facing interfaces used by the sync resources.
//!
//! Each manager turns a normalized payload into stored entities. Resources
//! receive them as trait objects through [`crate::state::AppState`]; the
//! Postgres implementations live in [`crate::db`], the in-memory ones in
//! [`crate::memory`].
//!
//! Expected outcomes (record not found, record rejected) are values of
//! [`Outcome`]; only storage faults are errors.

pub mod verifier;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use commerce_connector_core::{
    CustomerId, Email, NormalizedPromotion, PromotionId, PromotionType, QueueName,
    RouteException, StockRecord, StoreUuid, VerificationReport,
};

use crate::db::RepositoryError;
use crate::queue::PromotionQueuePayload;

pub use verifier::ApiMappingVerifier;

/// Result of an operation whose target may legitimately be missing or
/// unacceptable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Done(T),
    NotFound,
    Invalid(String),
}

/// Storage faults. These are retryable from the backend's point of view.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A customer known to the connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: CustomerId,
    pub email: Email,
    pub created_at: DateTime<Utc>,
}

/// What an upsert changed about a promotion's SKU associations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionChange {
    pub promotion_id: PromotionId,
    pub rule_id: String,
    pub created: bool,
    /// SKUs newly associated with the promotion.
    pub attached: Vec<String>,
    /// SKUs no longer associated with the promotion.
    pub detached: Vec<String>,
    /// Queue items written together with the change.
    pub enqueued: usize,
}

impl PromotionChange {
    /// The attach and detach items carrying this change, attach first.
    #[must_use]
    pub fn queue_work(&self, store: &StoreUuid) -> Vec<(QueueName, PromotionQueuePayload)> {
        let attach = PromotionQueuePayload::chunked(&self.rule_id, store, &self.attached)
            .into_iter()
            .map(|payload| (QueueName::Attach, payload));
        let detach = PromotionQueuePayload::chunked(&self.rule_id, store, &self.detached)
            .into_iter()
            .map(|payload| (QueueName::Detach, payload));
        attach.chain(detach).collect()
    }
}

#[async_trait]
pub trait ProductManager: Send + Sync {
    /// Apply one stock record for a store. Unknown SKUs yield `NotFound`.
    async fn update_stock(
        &self,
        store: &StoreUuid,
        record: &StockRecord,
    ) -> Result<Outcome<()>, ManagerError>;

    /// Associate a promotion with SKUs. Set semantics: already attached SKUs
    /// are left alone. Returns how many SKUs now carry the promotion among
    /// those requested; `NotFound` if the promotion does not exist.
    async fn attach_promotion(
        &self,
        rule_id: &str,
        skus: &[String],
    ) -> Result<Outcome<usize>, ManagerError>;

    /// Remove a promotion from SKUs. Missing associations are ignored.
    async fn detach_promotion(&self, rule_id: &str, skus: &[String])
    -> Result<usize, ManagerError>;
}

#[async_trait]
pub trait CustomerManager: Send + Sync {
    async fn find_by_email(&self, email: &Email) -> Result<Option<Customer>, ManagerError>;

    /// Delete a customer. `NotFound` if it disappeared since the lookup.
    async fn delete(&self, id: CustomerId) -> Result<Outcome<()>, ManagerError>;
}

/// SKUs a promotion should be attached to: none while it is disabled or
/// when it applies at cart level.
#[must_use]
pub fn applicable_skus(promotion: &NormalizedPromotion) -> &[String] {
    if promotion.status && promotion.promotion_type == PromotionType::Category {
        &promotion.skus
    } else {
        &[]
    }
}

/// Split the move from `current` to `desired` into SKUs to attach (in
/// `desired` order) and SKUs to detach (in `current` order).
#[must_use]
pub fn diff_skus(current: &[String], desired: &[String]) -> (Vec<String>, Vec<String>) {
    let attached = desired
        .iter()
        .filter(|sku| !current.contains(sku))
        .cloned()
        .collect();
    let detached = current
        .iter()
        .filter(|sku| !desired.contains(sku))
        .cloned()
        .collect();
    (attached, detached)
}

/// Stores promotions and the queue work their changes produce.
///
/// Every SKU set change is written atomically with its attach/detach queue
/// items ([`PromotionChange::queue_work`]): either both are stored or
/// neither is, so a failed write is repaired by replaying the record.
#[async_trait]
pub trait PromotionsManager: Send + Sync {
    /// Create or update a promotion keyed on `rule_id` and record `store`
    /// as one of the stores listing it (unless unspecified).
    ///
    /// Disabled promotions keep no SKUs. Replaying the same record returns
    /// empty `attached`/`detached` lists and queues nothing.
    async fn upsert(
        &self,
        store: &StoreUuid,
        promotion: &NormalizedPromotion,
    ) -> Result<PromotionChange, ManagerError>;

    /// Forget `store` as a source of every enabled promotion it lists whose
    /// `rule_id` is not in `keep`. A promotion no store lists any more is
    /// disabled and all of its SKUs are detached. Returns the disabled
    /// promotions. Used after a full pull of `store`.
    async fn disable_missing(
        &self,
        store: &StoreUuid,
        keep: &[String],
    ) -> Result<Vec<PromotionChange>, ManagerError>;

    /// SKUs the promotion should currently be attached to (empty while it
    /// is disabled), or `None` if it does not exist.
    async fn desired_skus(&self, rule_id: &str) -> Result<Option<Vec<String>>, ManagerError>;
}

#[async_trait]
pub trait MappingVerifier: Send + Sync {
    /// Check the local store mapping against the backend.
    ///
    /// Mapping problems are reported inside the report; only a failed
    /// backend call is an error.
    async fn verify(&self, store: &StoreUuid) -> Result<VerificationReport, RouteException>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MAX_SKUS_PER_ITEM;

    fn promotion(status: bool, promotion_type: PromotionType) -> NormalizedPromotion {
        NormalizedPromotion {
            code: "SUMMER".to_owned(),
            name: "SUMMER".to_owned(),
            rule_id: "SUMMER".to_owned(),
            status,
            skus: vec!["a".to_owned(), "b".to_owned()],
            description: None,
            promotion_type,
        }
    }

    #[test]
    fn test_only_enabled_category_promotions_apply_to_skus() {
        assert_eq!(applicable_skus(&promotion(true, PromotionType::Category)).len(), 2);
        assert!(applicable_skus(&promotion(false, PromotionType::Category)).is_empty());
        assert!(applicable_skus(&promotion(true, PromotionType::Cart)).is_empty());
    }

    #[test]
    fn test_diff_skus() {
        let current = vec!["a".to_owned(), "b".to_owned()];
        let desired = vec!["c".to_owned(), "b".to_owned()];

        let (attached, detached) = diff_skus(&current, &desired);
        assert_eq!(attached, vec!["c".to_owned()]);
        assert_eq!(detached, vec!["a".to_owned()]);

        let (attached, detached) = diff_skus(&desired, &desired);
        assert!(attached.is_empty() && detached.is_empty());
    }

    #[test]
    fn test_queue_work_chunks_attach_before_detach() {
        let change = PromotionChange {
            promotion_id: PromotionId::new(1),
            rule_id: "SUMMER".to_owned(),
            created: false,
            attached: (0..=MAX_SKUS_PER_ITEM).map(|i| format!("sku-{i}")).collect(),
            detached: vec!["old".to_owned()],
            enqueued: 0,
        };

        let work = change.queue_work(&StoreUuid::new("uuid-en"));
        let queues: Vec<QueueName> = work.iter().map(|(queue, _)| *queue).collect();
        assert_eq!(queues, vec![QueueName::Attach, QueueName::Attach, QueueName::Detach]);
        assert_eq!(work[2].1.skus, vec!["old".to_owned()]);
        assert_eq!(work[2].1.acm_uuid, "uuid-en");
    }
}
