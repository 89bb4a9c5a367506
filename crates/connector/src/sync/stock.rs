use tracing::{error, info, instrument, warn};

use commerce_connector_core::{StockRecord, StockSyncBatch};

use super::BatchReport;
use crate::managers::{Outcome, ProductManager};

/// Apply every record of a stock batch independently.
#[instrument(skip_all, fields(store = %batch.store, records = batch.records.len()))]
pub async fn sync_stock(products: &dyn ProductManager, batch: &StockSyncBatch) -> BatchReport {
    let mut report = BatchReport::default();

    for (index, value) in batch.records.iter().enumerate() {
        let record = match StockRecord::from_value(value) {
            Ok(record) => record,
            Err(e) => {
                warn!(index, error = %e, "Skipping undecodable stock record");
                report.failed += 1;
                continue;
            }
        };

        match products.update_stock(&batch.store, &record).await {
            Ok(Outcome::Done(())) => report.processed += 1,
            Ok(Outcome::NotFound) => {
                warn!(sku = %record.sku, "Stock received for unknown SKU");
                report.failed += 1;
            }
            Ok(Outcome::Invalid(reason)) => {
                warn!(sku = %record.sku, %reason, "Stock record rejected");
                report.failed += 1;
            }
            Err(e) => {
                error!(sku = %record.sku, error = %e, "Failed to store stock");
                report.failed += 1;
            }
        }
    }

    info!(
        processed = report.processed,
        failed = report.failed,
        "Stock sync finished"
    );
    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use commerce_connector_core::StoreUuid;

    use super::*;
    use crate::memory::MemoryStore;

    #[tokio::test]
    async fn test_one_failure_does_not_abort_batch() {
        let products = MemoryStore::new();
        for sku in ["a", "b", "c"] {
            products.add_sku(sku);
        }
        products.fail_stock_for("b");

        let store = StoreUuid::new("uuid-en");
        let body = json!({"sku": [
            {"sku": "a", "qty": 3},
            {"sku": "b", "qty": 1},
            {"sku": "c", "qty": "0"},
        ]});
        let batch = StockSyncBatch::from_body(store.clone(), &body).unwrap();

        let report = sync_stock(&products, &batch).await;
        assert_eq!(report, BatchReport { processed: 2, failed: 1 });

        let a = products.stock(&store, "a").unwrap();
        assert_eq!(a.qty, Decimal::new(3, 0));
        assert!(a.is_in_stock);
        assert!(!products.stock(&store, "c").unwrap().is_in_stock);
        assert!(products.stock(&store, "b").is_none());
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_records_are_counted() {
        let products = MemoryStore::new();
        products.add_sku("a");

        let body = json!({"sku": [{"qty": 1}, {"sku": "ghost"}, {"sku": "a"}]});
        let batch = StockSyncBatch::from_body(StoreUuid::unspecified(), &body).unwrap();

        let report = sync_stock(&products, &batch).await;
        assert_eq!(report, BatchReport { processed: 1, failed: 2 });
    }
}
