//! Customer deletion requested by the commerce backend.

use axum::{Json, body::Bytes, extract::State};
use tracing::{error, info, instrument, warn};

use commerce_connector_core::{Email, SyncResponse};

use super::json_body;
use crate::managers::Outcome;
use crate::state::AppState;

/// `POST /customer/delete`
///
/// Body `{ "email": "..." }`. A request without a usable email is the only
/// unsuccessful outcome and logs exactly one error. An unknown customer or a
/// storage failure is logged and still acknowledged, so the backend does not
/// retry a deletion that cannot succeed.
#[instrument(skip_all)]
pub async fn customer_delete(State(state): State<AppState>, body: Bytes) -> Json<SyncResponse> {
    let raw = json_body(&body)
        .ok()
        .and_then(|value| value.get("email")?.as_str().map(str::to_owned));

    let email = match raw.as_deref().map(Email::parse) {
        Some(Ok(email)) => email,
        Some(Err(e)) => {
            error!(error = %e, "Customer delete request has an invalid email");
            return Json(SyncResponse::rejected("Invalid email."));
        }
        None => {
            error!("Customer delete request has no email");
            return Json(SyncResponse::rejected("Missing email."));
        }
    };

    let customer = match state.customers().find_by_email(&email).await {
        Ok(Some(customer)) => customer,
        Ok(None) => {
            warn!(%email, "Customer to delete does not exist");
            return Json(SyncResponse::ok());
        }
        Err(e) => {
            error!(%email, error = %e, "Failed to look up customer");
            return Json(SyncResponse::ok());
        }
    };

    match state.customers().delete(customer.id).await {
        Ok(Outcome::Done(())) => info!(%email, customer_id = %customer.id, "Customer deleted"),
        Ok(Outcome::NotFound) => warn!(%email, "Customer disappeared before deletion"),
        Ok(Outcome::Invalid(reason)) => warn!(%email, %reason, "Customer deletion refused"),
        Err(e) => error!(%email, error = %e, "Failed to delete customer"),
    }

    Json(SyncResponse::ok())
}
