use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use commerce_connector_core::{PromotionRecord, RouteException, StoreUuid};

use crate::api::CommerceApi;
use crate::managers::PromotionsManager;

/// Counts from one promotion ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PromotionSyncReport {
    /// Records stored.
    pub processed: usize,
    /// Records that could not be normalized.
    pub skipped: usize,
    /// Records that could not be stored.
    pub failed: usize,
    /// Promotions disabled because the backend no longer lists them.
    pub disabled: usize,
    /// Queue items created.
    pub enqueued: usize,
    /// Rule ids of every stored record, in input order.
    #[serde(skip)]
    pub rule_ids: Vec<String>,
}

/// Interpret a promotion push body as a list of records.
///
/// A single object counts as a one-element list; anything else is a
/// structural error.
#[must_use]
pub fn promotion_records(body: Value) -> Option<Vec<Value>> {
    match body {
        Value::Array(records) => Some(records),
        record @ Value::Object(_) => Some(vec![record]),
        _ => None,
    }
}

/// Normalize and store every promotion record independently. Queue work is
/// written by the promotions manager together with each record.
#[instrument(skip_all, fields(store = %store, records = records.len()))]
pub async fn ingest_promotions(
    promotions: &dyn PromotionsManager,
    store: &StoreUuid,
    records: Vec<Value>,
) -> PromotionSyncReport {
    let mut report = PromotionSyncReport::default();

    for (index, value) in records.into_iter().enumerate() {
        let promotion = match PromotionRecord::from_value(value).and_then(PromotionRecord::normalize)
        {
            Ok(promotion) => promotion,
            Err(e) => {
                warn!(index, error = %e, "Skipping promotion record");
                report.skipped += 1;
                continue;
            }
        };

        match promotions.upsert(store, &promotion).await {
            Ok(change) => {
                report.processed += 1;
                report.enqueued += change.enqueued;
                report.rule_ids.push(change.rule_id);
            }
            Err(e) => {
                error!(rule_id = %promotion.rule_id, error = %e, "Failed to store promotion");
                report.failed += 1;
            }
        }
    }

    info!(
        processed = report.processed,
        skipped = report.skipped,
        failed = report.failed,
        enqueued = report.enqueued,
        "Promotion sync finished"
    );
    report
}

/// Fetch every promotion of a store from the backend, ingest them, then
/// disable the promotions this store no longer lists and no other store
/// does either.
///
/// # Errors
///
/// Returns the [`RouteException`] of a failed backend call. Nothing is
/// stored in that case.
#[instrument(skip(api, promotions), fields(store = %store))]
pub async fn pull_promotions(
    api: &dyn CommerceApi,
    promotions: &dyn PromotionsManager,
    store: &StoreUuid,
) -> Result<PromotionSyncReport, RouteException> {
    let records = api.fetch_promotions(store).await?;
    let mut report = ingest_promotions(promotions, store, records).await;

    // A record that failed to store is missing from `rule_ids`.
    if report.failed > 0 {
        warn!(
            failed = report.failed,
            "Not disabling missing promotions after failed records"
        );
        return Ok(report);
    }

    match promotions.disable_missing(store, &report.rule_ids).await {
        Ok(changes) => {
            report.enqueued += changes.iter().map(|change| change.enqueued).sum::<usize>();
            report.disabled = changes.len();
        }
        Err(e) => error!(error = %e, "Failed to disable missing promotions"),
    }

    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use commerce_connector_core::QueueName;
    use serde_json::json;

    use super::*;
    use crate::memory::{MemoryStore, StubCommerceApi};
    use crate::queue::PromotionQueue;

    fn store() -> StoreUuid {
        StoreUuid::new("uuid-en")
    }

    #[test]
    fn test_promotion_records_shapes() {
        assert_eq!(promotion_records(json!([{"code": "A"}])).unwrap().len(), 1);
        assert_eq!(promotion_records(json!({"code": "A"})).unwrap().len(), 1);
        assert!(promotion_records(json!("nope")).is_none());
        assert!(promotion_records(Value::Null).is_none());
    }

    #[tokio::test]
    async fn test_ingest_normalizes_and_queues() {
        let memory = MemoryStore::new();
        let records = vec![
            json!({"code": "SUMMER", "enabled": "1", "sku": ["a", "b"]}),
            json!({"name": "no code"}),
        ];

        let report = ingest_promotions(&memory, &store(), records).await;
        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.enqueued, 1);

        let promotion = memory.promotion("SUMMER").unwrap();
        assert_eq!(promotion.name, "SUMMER");
        assert!(promotion.status);

        let queued = memory.pending(QueueName::Attach).await.unwrap();
        assert_eq!(queued[0].payload.skus, vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(queued[0].payload.acm_uuid, "uuid-en");
    }

    #[tokio::test]
    async fn test_replay_queues_nothing_new() {
        let memory = MemoryStore::new();
        let body = json!([{"code": "SUMMER", "enabled": true, "sku": ["a"]}]);

        ingest_promotions(&memory, &store(), promotion_records(body.clone()).unwrap())
            .await;
        let replay =
            ingest_promotions(&memory, &store(), promotion_records(body).unwrap()).await;

        assert_eq!(replay.processed, 1);
        assert_eq!(replay.enqueued, 0);
        assert_eq!(memory.promotion_count(), 1);
        assert_eq!(memory.pending(QueueName::Attach).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_disabling_queues_detach() {
        let memory = MemoryStore::new();
        ingest_promotions(
            &memory,
            &store(),
            vec![json!({"code": "SUMMER", "enabled": 1, "sku": ["a"]})],
        )
        .await;

        let report = ingest_promotions(
            &memory,
            &store(),
            vec![json!({"code": "SUMMER", "enabled": 0, "sku": ["a"]})],
        )
        .await;

        assert_eq!(report.enqueued, 1);
        let detach = memory.pending(QueueName::Detach).await.unwrap();
        assert_eq!(detach[0].payload.skus, vec!["a".to_owned()]);
    }

    #[tokio::test]
    async fn test_pull_disables_missing_promotions() {
        let memory = MemoryStore::new();
        let api = StubCommerceApi::new();

        ingest_promotions(
            &memory,
            &store(),
            vec![json!({"code": "OLD", "enabled": true, "sku": ["x"]})],
        )
        .await;

        api.set_promotions(vec![json!({"code": "NEW", "enabled": true, "sku": ["y"]})]);
        let report = pull_promotions(&api, &memory, &store()).await.unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.disabled, 1);
        assert!(!memory.promotion("OLD").unwrap().status);
        assert_eq!(memory.pending(QueueName::Detach).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pull_failure_stores_nothing() {
        let memory = MemoryStore::new();
        let api = StubCommerceApi::new();
        api.fail("promotions", 500, "boom");

        let err = pull_promotions(&api, &memory, &store()).await.unwrap_err();
        assert_eq!(err.operation(), "promotions");
        assert_eq!(memory.promotion_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_queue_write_is_repaired_by_replay() {
        let memory = MemoryStore::new();
        memory.fail_next_enqueues(1);
        let body = json!({"code": "SUMMER", "enabled": true, "sku": ["a"]});

        let first = ingest_promotions(&memory, &store(), vec![body.clone()]).await;
        assert_eq!(first.failed, 1);
        assert!(memory.pending(QueueName::Attach).await.unwrap().is_empty());

        let replay = ingest_promotions(&memory, &store(), vec![body]).await;
        assert_eq!(replay.processed, 1);
        assert_eq!(replay.enqueued, 1);

        let queued = memory.pending(QueueName::Attach).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].payload.skus, vec!["a".to_owned()]);
    }

    #[tokio::test]
    async fn test_pull_leaves_other_stores_promotions_alone() {
        let memory = MemoryStore::new();
        let api = StubCommerceApi::new();
        let fr = StoreUuid::new("uuid-fr");

        ingest_promotions(
            &memory,
            &fr,
            vec![json!({"code": "ONLY_FR", "enabled": true, "sku": ["x"]})],
        )
        .await;
        ingest_promotions(
            &memory,
            &store(),
            vec![json!({"code": "OLD", "enabled": true, "sku": ["y"]})],
        )
        .await;

        api.set_promotions(vec![json!({"code": "NEW", "enabled": true, "sku": ["z"]})]);
        let report = pull_promotions(&api, &memory, &store()).await.unwrap();

        assert_eq!(report.disabled, 1);
        assert!(!memory.promotion("OLD").unwrap().status);
        assert!(memory.promotion("ONLY_FR").unwrap().status);
        assert_eq!(memory.promotion_skus("ONLY_FR"), vec!["x".to_owned()]);
        let detach = memory.pending(QueueName::Detach).await.unwrap();
        assert_eq!(detach.len(), 1);
        assert_eq!(detach[0].payload.rule_id, "OLD");
    }
}
