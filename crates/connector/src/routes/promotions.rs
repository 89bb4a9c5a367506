//! Promotion push from the commerce backend.

use axum::{Json, body::Bytes, extract::State};
use tracing::{error, instrument};

use commerce_connector_core::SyncResponse;

use super::json_body;
use crate::middleware::AcmStore;
use crate::state::AppState;
use crate::sync::{ingest_promotions, promotion_records};

/// `POST /promotionsync`
///
/// Body is a list of promotion records, or a single record. Records are
/// stored and their SKU changes queued one by one; skipped and failed
/// records are reported together in `failed`.
#[instrument(skip(state, body), fields(store = %store))]
pub async fn promotion_sync(
    State(state): State<AppState>,
    AcmStore(store): AcmStore,
    body: Bytes,
) -> Json<SyncResponse> {
    let records = match json_body(&body) {
        Ok(value) => promotion_records(value),
        Err(e) => {
            error!(error = %e, "Promotion push is not valid JSON");
            return Json(SyncResponse::rejected("Invalid JSON body."));
        }
    };

    let Some(records) = records else {
        error!("Promotion push is neither a list nor a record");
        return Json(SyncResponse::rejected("Expected a list of promotions."));
    };

    let report = ingest_promotions(state.promotions(), &store, records).await;
    Json(SyncResponse::batch(
        report.processed,
        report.skipped + report.failed,
    ))
}
