//! Store mapping verification.

use axum::{Json, extract::State};
use tracing::instrument;

use commerce_connector_core::VerificationReport;

use crate::middleware::AcmStore;
use crate::state::AppState;

/// `GET /acquia/verify`
///
/// Computed on every call. A failed backend call is logged as the route
/// exception rules say and reported as a failed verification. No notice is
/// queued.
#[instrument(skip(state), fields(store = %store))]
pub async fn verify_mapping(
    State(state): State<AppState>,
    AcmStore(store): AcmStore,
) -> Json<VerificationReport> {
    match state.verifier().verify(&store).await {
        Ok(report) => Json(report),
        Err(exception) => {
            let advice = state
                .route_exceptions()
                .explain(&exception)
                .unwrap_or_else(|| exception.to_string());
            let (system_api_url, connector_api_url) = state.api_urls();
            Json(VerificationReport::failed(
                &store,
                system_api_url,
                connector_api_url,
                advice,
            ))
        }
    }
}
