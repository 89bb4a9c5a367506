//! Operator actions.
//!
//! The pull actions answer with a redirect to `/admin`, or to wherever the
//! route exception settings send a failed backend call. Their outcome is
//! reported through the notice queue.

use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use commerce_connector_core::{QueueName, StoreUuid};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::AcmStore;
use crate::notices::{Notice, NoticeLevel};
use crate::state::AppState;
use crate::sync::pull_promotions;

const ADMIN_PATH: &str = "/admin";

/// Optional store override for operator actions.
#[derive(Debug, Default, Deserialize)]
pub struct StoreQuery {
    #[serde(default)]
    pub acm_uuid: Option<String>,
}

impl StoreQuery {
    /// The queried store, else the one named by the header.
    fn resolve(self, header: StoreUuid) -> StoreUuid {
        self.acm_uuid
            .map(StoreUuid::new)
            .filter(|store| !store.is_unspecified())
            .unwrap_or(header)
    }
}

#[derive(Debug, Serialize)]
pub struct StoreSummary {
    pub acm_uuid: String,
    pub store_code: String,
    pub locale: String,
}

#[derive(Debug, Serialize)]
pub struct QueueBacklog {
    pub attach: usize,
    pub detach: usize,
}

#[derive(Debug, Serialize)]
pub struct AdminOverview {
    pub stores: Vec<StoreSummary>,
    pub queue: QueueBacklog,
    pub notices: Vec<Notice>,
}

/// `GET /admin`
///
/// Shows the configured stores and the queue backlog. Pending notices are
/// included and cleared.
///
/// # Errors
///
/// Returns an error if the queue cannot be read.
#[instrument(skip(state))]
pub async fn overview(State(state): State<AppState>) -> Result<Json<AdminOverview>> {
    let stores = state
        .settings()
        .stores
        .iter()
        .map(|store| StoreSummary {
            acm_uuid: store.acm_uuid.clone(),
            store_code: store.store_code.clone(),
            locale: store.locale.clone(),
        })
        .collect();

    let queue = QueueBacklog {
        attach: state.queue().pending(QueueName::Attach).await?.len(),
        detach: state.queue().pending(QueueName::Detach).await?.len(),
    };

    Ok(Json(AdminOverview {
        stores,
        queue,
        notices: state.notices().drain(),
    }))
}

/// `POST /admin/sync/products`: ask the backend to push every product.
#[instrument(skip(state, query, header))]
pub async fn sync_products(
    State(state): State<AppState>,
    AcmStore(header): AcmStore,
    Query(query): Query<StoreQuery>,
) -> Response {
    let store = query.resolve(header);
    add_breadcrumb("admin", "Product sync requested", &[("acm_uuid", store.as_str())]);

    match state.api().request_product_sync(&store, &[]).await {
        Ok(()) => {
            info!(store = %store, "Full product sync requested");
            state
                .notices()
                .push(NoticeLevel::Status, "Product synchronization requested.");
            Redirect::to(ADMIN_PATH).into_response()
        }
        Err(exception) => state
            .route_exceptions()
            .handle(&exception, ADMIN_PATH)
            .into_response(),
    }
}

/// `POST /admin/sync/promotions`: pull every promotion and ingest it.
#[instrument(skip(state, query, header))]
pub async fn sync_promotions(
    State(state): State<AppState>,
    AcmStore(header): AcmStore,
    Query(query): Query<StoreQuery>,
) -> Response {
    let store = query.resolve(header);
    add_breadcrumb("admin", "Promotion sync requested", &[("acm_uuid", store.as_str())]);

    match pull_promotions(state.api(), state.promotions(), &store).await {
        Ok(report) => {
            let level = if report.failed > 0 {
                NoticeLevel::Warning
            } else {
                NoticeLevel::Status
            };
            state.notices().push(
                level,
                format!(
                    "Promotions synchronized: {} stored, {} skipped, {} failed, {} disabled.",
                    report.processed, report.skipped, report.failed, report.disabled
                ),
            );
            Redirect::to(ADMIN_PATH).into_response()
        }
        Err(exception) => state
            .route_exceptions()
            .handle(&exception, ADMIN_PATH)
            .into_response(),
    }
}
