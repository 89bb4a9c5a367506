//! Stock push from the commerce backend.

use axum::{Json, body::Bytes, extract::State};
use tracing::{error, instrument};

use commerce_connector_core::{StockSyncBatch, SyncResponse};

use super::json_body;
use crate::middleware::AcmStore;
use crate::state::AppState;
use crate::sync::sync_stock;

/// `POST /productstocksync`
///
/// Body `{ "sku": [ ... ] }`. Failing records are logged and counted; only
/// a body without a `sku` list is unsuccessful.
#[instrument(skip(state, body), fields(store = %store))]
pub async fn product_stock_sync(
    State(state): State<AppState>,
    AcmStore(store): AcmStore,
    body: Bytes,
) -> Json<SyncResponse> {
    let value = match json_body(&body) {
        Ok(value) => value,
        Err(e) => {
            error!(error = %e, "Stock push is not valid JSON");
            return Json(SyncResponse::rejected("Invalid JSON body."));
        }
    };

    let Some(batch) = StockSyncBatch::from_body(store, &value) else {
        error!("Stock push has no sku list");
        return Json(SyncResponse::rejected("Missing sku list."));
    };

    let report = sync_stock(state.products(), &batch).await;
    Json(SyncResponse::batch(report.processed, report.failed))
}
