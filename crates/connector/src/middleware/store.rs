//! Store identification from the `X-ACM-UUID` header.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use commerce_connector_core::{ACM_UUID_HEADER, StoreUuid};

/// The store a request is about.
///
/// Never rejects: a missing or non-text header yields the unspecified
/// store, which each resource handles on its own terms.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(AcmStore(store): AcmStore) -> String {
///     store.to_string()
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcmStore(pub StoreUuid);

impl<S> FromRequestParts<S> for AcmStore
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let store = parts
            .headers
            .get(ACM_UUID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map_or_else(StoreUuid::unspecified, StoreUuid::new);

        if !store.is_unspecified() {
            sentry::configure_scope(|scope| scope.set_tag("acm_uuid", store.as_str()));
        }

        Ok(Self(store))
    }
}
