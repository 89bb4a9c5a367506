//! In-memory managers, queue and commerce backend.
//!
//! Used by the test suites and for running the connector without Postgres.
//! Each type can be told to fail on purpose so the error paths of the
//! resources and the queue runner can be exercised.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use commerce_connector_core::{
    CustomerId, Email, NormalizedPromotion, PromotionId, QueueItemId, QueueItemState, QueueName,
    RouteException, SkuId, StockRecord, StoreUuid, UpstreamStoreConfig,
};

use crate::api::CommerceApi;
use crate::managers::{
    Customer, CustomerManager, ManagerError, Outcome, ProductManager, PromotionChange,
    PromotionsManager, applicable_skus, diff_skus,
};
use crate::queue::{PromotionQueue, PromotionQueuePayload, QueueError, QueueItem};

/// Stock of one SKU in one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevel {
    pub qty: Decimal,
    pub is_in_stock: bool,
}

#[derive(Debug)]
struct SkuEntry {
    id: SkuId,
    stock: HashMap<String, StockLevel>,
    promotions: BTreeSet<String>,
}

#[derive(Debug)]
struct PromotionEntry {
    id: PromotionId,
    promotion: NormalizedPromotion,
    skus: Vec<String>,
    stores: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i32,
    next_item_id: i64,
    skus: BTreeMap<String, SkuEntry>,
    customers: HashMap<CustomerId, Customer>,
    promotions: BTreeMap<String, PromotionEntry>,
    queue: BTreeMap<QueueItemId, QueueItem>,
    failing_skus: HashSet<String>,
    failing_customer_deletes: bool,
    failing_attaches: usize,
    failing_enqueues: usize,
    customer_lookups: usize,
    customer_deletes: usize,
}

impl Inner {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    /// Consume one scheduled queue write failure, if any.
    fn take_enqueue_failure(&mut self) -> bool {
        if self.failing_enqueues == 0 {
            return false;
        }
        self.failing_enqueues -= 1;
        true
    }

    fn push_item(&mut self, queue: QueueName, payload: PromotionQueuePayload) -> QueueItemId {
        self.next_item_id += 1;
        let id = QueueItemId::new(self.next_item_id);
        self.queue.insert(
            id,
            QueueItem {
                id,
                queue,
                payload,
                attempts: 0,
                state: QueueItemState::Pending,
                last_error: None,
                available_at: Utc::now(),
            },
        );
        id
    }

    fn push_work(&mut self, work: Vec<(QueueName, PromotionQueuePayload)>) -> usize {
        let count = work.len();
        for (queue, payload) in work {
            self.push_item(queue, payload);
        }
        count
    }
}

/// Every manager and the promotion queue, backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make a SKU known locally.
    pub fn add_sku(&self, sku: &str) -> SkuId {
        let mut inner = self.lock();
        if let Some(entry) = inner.skus.get(sku) {
            return entry.id;
        }
        let id = SkuId::new(inner.next_id());
        inner.skus.insert(
            sku.to_owned(),
            SkuEntry {
                id,
                stock: HashMap::new(),
                promotions: BTreeSet::new(),
            },
        );
        id
    }

    /// Add a customer.
    pub fn add_customer(&self, email: &Email) -> Customer {
        let mut inner = self.lock();
        let customer = Customer {
            id: CustomerId::new(inner.next_id()),
            email: email.clone(),
            created_at: Utc::now(),
        };
        inner.customers.insert(customer.id, customer.clone());
        customer
    }

    /// Make stock updates for `sku` fail with a storage error.
    pub fn fail_stock_for(&self, sku: &str) {
        self.lock().failing_skus.insert(sku.to_owned());
    }

    /// Make customer deletion fail with a storage error.
    pub fn fail_customer_deletes(&self, fail: bool) {
        self.lock().failing_customer_deletes = fail;
    }

    /// Make the next `count` promotion attaches fail with a storage error.
    pub fn fail_next_attaches(&self, count: usize) {
        self.lock().failing_attaches = count;
    }

    /// Make the next `count` queue writes fail, whether they come from
    /// [`PromotionQueue::enqueue`] or from a promotion change.
    pub fn fail_next_enqueues(&self, count: usize) {
        self.lock().failing_enqueues = count;
    }

    #[must_use]
    pub fn stock(&self, store: &StoreUuid, sku: &str) -> Option<StockLevel> {
        self.lock()
            .skus
            .get(sku)
            .and_then(|entry| entry.stock.get(store.as_str()).copied())
    }

    #[must_use]
    pub fn customer_count(&self) -> usize {
        self.lock().customers.len()
    }

    /// Number of customer lookups and delete calls made so far.
    #[must_use]
    pub fn customer_calls(&self) -> (usize, usize) {
        let inner = self.lock();
        (inner.customer_lookups, inner.customer_deletes)
    }

    #[must_use]
    pub fn promotion(&self, rule_id: &str) -> Option<NormalizedPromotion> {
        self.lock()
            .promotions
            .get(rule_id)
            .map(|entry| entry.promotion.clone())
    }

    #[must_use]
    pub fn promotion_count(&self) -> usize {
        self.lock().promotions.len()
    }

    /// SKUs the promotion is meant to apply to.
    #[must_use]
    pub fn promotion_skus(&self, rule_id: &str) -> Vec<String> {
        self.lock()
            .promotions
            .get(rule_id)
            .map(|entry| entry.skus.clone())
            .unwrap_or_default()
    }

    /// Stores currently listing the promotion.
    #[must_use]
    pub fn promotion_stores(&self, rule_id: &str) -> Vec<String> {
        self.lock()
            .promotions
            .get(rule_id)
            .map(|entry| entry.stores.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Promotions currently attached to a product.
    #[must_use]
    pub fn attached_promotions(&self, sku: &str) -> Vec<String> {
        self.lock()
            .skus
            .get(sku)
            .map(|entry| entry.promotions.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Items that ran out of attempts.
    #[must_use]
    pub fn failed_items(&self) -> Vec<QueueItem> {
        self.lock()
            .queue
            .values()
            .filter(|item| item.state == QueueItemState::Failed)
            .cloned()
            .collect()
    }

    fn set_state(
        &self,
        id: QueueItemId,
        state: QueueItemState,
        error: &str,
    ) -> Result<(), QueueError> {
        let mut inner = self.lock();
        let item = inner.queue.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        item.state = state;
        item.last_error = Some(error.to_owned());
        item.available_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ProductManager for MemoryStore {
    async fn update_stock(
        &self,
        store: &StoreUuid,
        record: &StockRecord,
    ) -> Result<Outcome<()>, ManagerError> {
        let mut inner = self.lock();
        if inner.failing_skus.contains(&record.sku) {
            return Err(ManagerError::Unavailable(format!(
                "stock write for {} failed",
                record.sku
            )));
        }
        let Some(entry) = inner.skus.get_mut(&record.sku) else {
            return Ok(Outcome::NotFound);
        };
        entry.stock.insert(
            store.as_str().to_owned(),
            StockLevel {
                qty: record.qty,
                is_in_stock: record.is_in_stock,
            },
        );
        Ok(Outcome::Done(()))
    }

    async fn attach_promotion(
        &self,
        rule_id: &str,
        skus: &[String],
    ) -> Result<Outcome<usize>, ManagerError> {
        let mut inner = self.lock();
        if inner.failing_attaches > 0 {
            inner.failing_attaches -= 1;
            return Err(ManagerError::Unavailable("attach failed".to_owned()));
        }
        if !inner.promotions.contains_key(rule_id) {
            return Ok(Outcome::NotFound);
        }
        let mut attached = 0;
        for sku in skus {
            if let Some(entry) = inner.skus.get_mut(sku) {
                entry.promotions.insert(rule_id.to_owned());
                attached += 1;
            }
        }
        Ok(Outcome::Done(attached))
    }

    async fn detach_promotion(
        &self,
        rule_id: &str,
        skus: &[String],
    ) -> Result<usize, ManagerError> {
        let mut inner = self.lock();
        let mut detached = 0;
        for sku in skus {
            if let Some(entry) = inner.skus.get_mut(sku)
                && entry.promotions.remove(rule_id)
            {
                detached += 1;
            }
        }
        Ok(detached)
    }
}

#[async_trait]
impl CustomerManager for MemoryStore {
    async fn find_by_email(&self, email: &Email) -> Result<Option<Customer>, ManagerError> {
        let mut inner = self.lock();
        inner.customer_lookups += 1;
        Ok(inner
            .customers
            .values()
            .find(|c| c.email.matches(email))
            .cloned())
    }

    async fn delete(&self, id: CustomerId) -> Result<Outcome<()>, ManagerError> {
        let mut inner = self.lock();
        inner.customer_deletes += 1;
        if inner.failing_customer_deletes {
            return Err(ManagerError::Unavailable("customer delete failed".to_owned()));
        }
        Ok(match inner.customers.remove(&id) {
            Some(_) => Outcome::Done(()),
            None => Outcome::NotFound,
        })
    }
}

#[async_trait]
impl PromotionsManager for MemoryStore {
    async fn upsert(
        &self,
        store: &StoreUuid,
        promotion: &NormalizedPromotion,
    ) -> Result<PromotionChange, ManagerError> {
        let mut inner = self.lock();
        let desired = applicable_skus(promotion).to_vec();
        let current = inner
            .promotions
            .get(&promotion.rule_id)
            .map(|entry| entry.skus.clone())
            .unwrap_or_default();
        let (attached, detached) = diff_skus(&current, &desired);

        if !(attached.is_empty() && detached.is_empty()) && inner.take_enqueue_failure() {
            return Err(ManagerError::Unavailable("queue write failed".to_owned()));
        }

        let existing = inner.promotions.get(&promotion.rule_id).map(|entry| entry.id);
        let (promotion_id, created) = match existing {
            Some(id) => (id, false),
            None => (PromotionId::new(inner.next_id()), true),
        };

        let entry = inner
            .promotions
            .entry(promotion.rule_id.clone())
            .or_insert_with(|| PromotionEntry {
                id: promotion_id,
                promotion: promotion.clone(),
                skus: Vec::new(),
                stores: BTreeSet::new(),
            });
        entry.promotion = promotion.clone();
        entry.skus = desired;
        if !store.is_unspecified() {
            entry.stores.insert(store.as_str().to_owned());
        }

        let mut change = PromotionChange {
            promotion_id,
            rule_id: promotion.rule_id.clone(),
            created,
            attached,
            detached,
            enqueued: 0,
        };
        change.enqueued = inner.push_work(change.queue_work(store));
        Ok(change)
    }

    async fn disable_missing(
        &self,
        store: &StoreUuid,
        keep: &[String],
    ) -> Result<Vec<PromotionChange>, ManagerError> {
        if store.is_unspecified() {
            return Ok(Vec::new());
        }

        let mut inner = self.lock();
        let stale: Vec<String> = inner
            .promotions
            .values()
            .filter(|entry| {
                entry.promotion.status
                    && entry.stores.contains(store.as_str())
                    && !keep.contains(&entry.promotion.rule_id)
            })
            .map(|entry| entry.promotion.rule_id.clone())
            .collect();

        let queues_work = stale.iter().any(|rule_id| {
            inner
                .promotions
                .get(rule_id)
                .is_some_and(|entry| entry.stores.len() == 1 && !entry.skus.is_empty())
        });
        if queues_work && inner.take_enqueue_failure() {
            return Err(ManagerError::Unavailable("queue write failed".to_owned()));
        }

        let mut changes = Vec::new();
        for rule_id in stale {
            let Some(entry) = inner.promotions.get_mut(&rule_id) else {
                continue;
            };
            entry.stores.remove(store.as_str());
            if !entry.stores.is_empty() {
                continue;
            }
            entry.promotion.status = false;
            let mut change = PromotionChange {
                promotion_id: entry.id,
                rule_id,
                created: false,
                attached: Vec::new(),
                detached: std::mem::take(&mut entry.skus),
                enqueued: 0,
            };
            change.enqueued = inner.push_work(change.queue_work(store));
            changes.push(change);
        }
        Ok(changes)
    }

    async fn desired_skus(&self, rule_id: &str) -> Result<Option<Vec<String>>, ManagerError> {
        Ok(self
            .lock()
            .promotions
            .get(rule_id)
            .map(|entry| entry.skus.clone()))
    }
}

#[async_trait]
impl PromotionQueue for MemoryStore {
    async fn enqueue(
        &self,
        queue: QueueName,
        payload: &PromotionQueuePayload,
    ) -> Result<QueueItemId, QueueError> {
        let mut inner = self.lock();
        if inner.take_enqueue_failure() {
            return Err(QueueError::Unavailable("queue write failed".to_owned()));
        }
        Ok(inner.push_item(queue, payload.clone()))
    }

    async fn claim(
        &self,
        queue: QueueName,
        limit: u32,
        lease: Duration,
    ) -> Result<Vec<QueueItem>, QueueError> {
        let now = Utc::now();
        let until = chrono::Duration::from_std(lease)
            .ok()
            .and_then(|lease| now.checked_add_signed(lease))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);

        let mut inner = self.lock();
        let claimed = inner
            .queue
            .values_mut()
            .filter(|item| {
                item.queue == queue
                    && item.state != QueueItemState::Failed
                    && item.available_at <= now
            })
            .take(limit)
            .map(|item| {
                item.state = QueueItemState::Claimed;
                item.attempts += 1;
                item.available_at = until;
                item.clone()
            })
            .collect();
        Ok(claimed)
    }

    async fn complete(&self, id: QueueItemId) -> Result<(), QueueError> {
        self.lock()
            .queue
            .remove(&id)
            .map(|_| ())
            .ok_or(QueueError::NotFound(id))
    }

    async fn release(&self, id: QueueItemId, error: &str) -> Result<(), QueueError> {
        self.set_state(id, QueueItemState::Pending, error)
    }

    async fn fail(&self, id: QueueItemId, error: &str) -> Result<(), QueueError> {
        self.set_state(id, QueueItemState::Failed, error)
    }

    async fn pending(&self, queue: QueueName) -> Result<Vec<QueueItem>, QueueError> {
        Ok(self
            .lock()
            .queue
            .values()
            .filter(|item| item.queue == queue && item.state != QueueItemState::Failed)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
struct StubState {
    store_configs: HashMap<String, UpstreamStoreConfig>,
    promotions: Vec<Value>,
    failures: HashMap<String, (u16, String)>,
    store_config_calls: usize,
    sync_requests: Vec<(String, Vec<String>)>,
}

/// A scripted commerce backend.
#[derive(Debug, Default)]
pub struct StubCommerceApi {
    state: Mutex<StubState>,
}

impl StubCommerceApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set what `store_config` returns for a store.
    pub fn set_store_config(&self, acm_uuid: &str, config: UpstreamStoreConfig) {
        self.lock().store_configs.insert(acm_uuid.to_owned(), config);
    }

    /// Set what `fetch_promotions` returns.
    pub fn set_promotions(&self, promotions: Vec<Value>) {
        self.lock().promotions = promotions;
    }

    /// Make every call of `operation` fail until [`Self::recover`].
    pub fn fail(&self, operation: &str, code: u16, message: &str) {
        self.lock()
            .failures
            .insert(operation.to_owned(), (code, message.to_owned()));
    }

    pub fn recover(&self, operation: &str) {
        self.lock().failures.remove(operation);
    }

    #[must_use]
    pub fn store_config_calls(&self) -> usize {
        self.lock().store_config_calls
    }

    /// Product sync requests received, as `(acm_uuid, skus)`.
    #[must_use]
    pub fn sync_requests(&self) -> Vec<(String, Vec<String>)> {
        self.lock().sync_requests.clone()
    }

    fn check(state: &StubState, operation: &str) -> Result<(), RouteException> {
        match state.failures.get(operation) {
            Some((code, message)) => Err(RouteException::new(operation, *code, message.as_str())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CommerceApi for StubCommerceApi {
    async fn store_config(&self, store: &StoreUuid) -> Result<UpstreamStoreConfig, RouteException> {
        let operation = crate::api::operations::STORE_CONFIG;
        let mut state = self.lock();
        state.store_config_calls += 1;
        Self::check(&state, operation)?;
        state
            .store_configs
            .get(store.as_str())
            .cloned()
            .ok_or_else(|| RouteException::new(operation, 404, "store not found"))
    }

    async fn request_product_sync(
        &self,
        store: &StoreUuid,
        skus: &[String],
    ) -> Result<(), RouteException> {
        let mut state = self.lock();
        Self::check(&state, crate::api::operations::PRODUCT_FULL_SYNC)?;
        state
            .sync_requests
            .push((store.as_str().to_owned(), skus.to_vec()));
        Ok(())
    }

    async fn fetch_promotions(&self, _store: &StoreUuid) -> Result<Vec<Value>, RouteException> {
        let state = self.lock();
        Self::check(&state, crate::api::operations::PROMOTIONS)?;
        Ok(state.promotions.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn promotion(rule_id: &str, status: bool, skus: &[&str]) -> NormalizedPromotion {
        NormalizedPromotion {
            code: rule_id.to_owned(),
            name: rule_id.to_owned(),
            rule_id: rule_id.to_owned(),
            status,
            skus: skus.iter().map(|s| (*s).to_owned()).collect(),
            description: None,
            promotion_type: commerce_connector_core::PromotionType::Category,
        }
    }

    #[tokio::test]
    async fn test_update_stock_unknown_sku_is_not_found() {
        let store = MemoryStore::new();
        let record = StockRecord {
            sku: "ghost".to_owned(),
            qty: Decimal::ONE,
            is_in_stock: true,
        };
        let outcome = store
            .update_stock(&StoreUuid::new("s"), &record)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::NotFound);
    }

    fn en() -> StoreUuid {
        StoreUuid::new("uuid-en")
    }

    #[tokio::test]
    async fn test_upsert_reports_sku_diff_and_queues_it() {
        let store = MemoryStore::new();

        let first = store.upsert(&en(), &promotion("R1", true, &["a", "b"])).await.unwrap();
        assert!(first.created);
        assert_eq!(first.attached.len(), 2);
        assert_eq!(first.enqueued, 1);

        let replay = store.upsert(&en(), &promotion("R1", true, &["a", "b"])).await.unwrap();
        assert!(!replay.created);
        assert!(replay.attached.is_empty() && replay.detached.is_empty());
        assert_eq!(replay.enqueued, 0);

        let disabled = store.upsert(&en(), &promotion("R1", false, &["a", "b"])).await.unwrap();
        assert_eq!(disabled.detached.len(), 2);
        assert!(store.promotion_skus("R1").is_empty());
        assert_eq!(store.desired_skus("R1").await.unwrap(), Some(Vec::new()));
        assert_eq!(store.desired_skus("NOPE").await.unwrap(), None);

        assert_eq!(store.pending(QueueName::Attach).await.unwrap().len(), 1);
        assert_eq!(store.pending(QueueName::Detach).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_queue_write_stores_nothing() {
        let store = MemoryStore::new();
        store.fail_next_enqueues(1);

        assert!(store.upsert(&en(), &promotion("R1", true, &["a"])).await.is_err());
        assert_eq!(store.promotion_count(), 0);
        assert!(store.pending(QueueName::Attach).await.unwrap().is_empty());

        let retry = store.upsert(&en(), &promotion("R1", true, &["a"])).await.unwrap();
        assert!(retry.created);
        assert_eq!(retry.enqueued, 1);
    }

    #[tokio::test]
    async fn test_disable_missing() {
        let store = MemoryStore::new();
        store.upsert(&en(), &promotion("KEEP", true, &["a"])).await.unwrap();
        store.upsert(&en(), &promotion("GONE", true, &["b"])).await.unwrap();

        let changes = store.disable_missing(&en(), &["KEEP".to_owned()]).await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].rule_id, "GONE");
        assert_eq!(changes[0].detached, vec!["b".to_owned()]);
        assert_eq!(changes[0].enqueued, 1);
        assert!(!store.promotion("GONE").unwrap().status);
        assert!(store.promotion("KEEP").unwrap().status);
    }

    #[tokio::test]
    async fn test_disable_missing_is_scoped_to_store() {
        let store = MemoryStore::new();
        let fr = StoreUuid::new("uuid-fr");
        store.upsert(&fr, &promotion("ONLY_FR", true, &["a"])).await.unwrap();
        store.upsert(&en(), &promotion("SHARED", true, &["b"])).await.unwrap();
        store.upsert(&fr, &promotion("SHARED", true, &["b"])).await.unwrap();

        let changes = store.disable_missing(&en(), &[]).await.unwrap();
        assert!(changes.is_empty());
        assert!(store.promotion("ONLY_FR").unwrap().status);
        assert!(store.promotion("SHARED").unwrap().status);
        assert_eq!(store.promotion_stores("SHARED"), vec!["uuid-fr".to_owned()]);

        let changes = store.disable_missing(&fr, &[]).await.unwrap();
        assert_eq!(changes.len(), 2);
        assert!(!store.promotion("SHARED").unwrap().status);
        assert!(
            store
                .disable_missing(&StoreUuid::unspecified(), &[])
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_claim_hides_item_for_lease() {
        let store = MemoryStore::new();
        let payload = PromotionQueuePayload {
            rule_id: "R1".to_owned(),
            skus: vec!["a".to_owned()],
            acm_uuid: String::new(),
        };
        let id = store.enqueue(QueueName::Attach, &payload).await.unwrap();

        let lease = Duration::from_secs(60);
        let claimed = store.claim(QueueName::Attach, 10, lease).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].attempts, 1);
        assert!(store.claim(QueueName::Attach, 10, lease).await.unwrap().is_empty());

        store.release(id, "boom").await.unwrap();
        let again = store.claim(QueueName::Attach, 10, lease).await.unwrap();
        assert_eq!(again[0].attempts, 2);
        assert_eq!(again[0].last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_stub_failures_are_route_exceptions() {
        let api = StubCommerceApi::new();
        api.fail("promotions", 502, "bad gateway");

        let err = api.fetch_promotions(&StoreUuid::new("s")).await.unwrap_err();
        assert_eq!(err.code(), 502);

        api.recover("promotions");
        assert!(api.fetch_promotions(&StoreUuid::new("s")).await.unwrap().is_empty());
    }
}
