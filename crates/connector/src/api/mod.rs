//! Outbound calls to the commerce backend.
//!
//! Every failed call surfaces as a [`RouteException`] naming the operation,
//! so the route exception handler can pick the configured presentation.
//!
//! # Operations
//!
//! | Operation | Request |
//! |---|---|
//! | `store_config` | `GET v1/store/{acm_uuid}/config` |
//! | `product_full_sync` | `POST v1/ingest/product/sync` |
//! | `promotions` | `GET v1/store/{acm_uuid}/promotions` |

mod client;

use async_trait::async_trait;
use serde_json::Value;

use commerce_connector_core::{RouteException, StoreUuid, UpstreamStoreConfig};

pub use client::HttpCommerceApi;

/// Operation names, used as route exception configuration keys.
pub mod operations {
    pub const STORE_CONFIG: &str = "store_config";
    pub const PRODUCT_FULL_SYNC: &str = "product_full_sync";
    pub const PROMOTIONS: &str = "promotions";
}

/// The commerce backend as seen by the connector.
#[async_trait]
pub trait CommerceApi: Send + Sync {
    /// Fetch the backend's configuration of a store.
    async fn store_config(&self, store: &StoreUuid) -> Result<UpstreamStoreConfig, RouteException>;

    /// Ask the backend to push the given SKUs again; an empty list requests a
    /// full product sync for the store.
    async fn request_product_sync(
        &self,
        store: &StoreUuid,
        skus: &[String],
    ) -> Result<(), RouteException>;

    /// Fetch every promotion of a store as raw records.
    async fn fetch_promotions(&self, store: &StoreUuid) -> Result<Vec<Value>, RouteException>;
}
