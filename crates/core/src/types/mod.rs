//! Core types for the commerce connector.
//!
//! This module provides type-safe wrappers and payload shapes for the sync
//! contract between the commerce backend and the local content store.

pub mod email;
pub mod flag;
pub mod id;
pub mod promotion;
pub mod route_exception;
pub mod status;
pub mod stock;
pub mod store;
pub mod sync;
pub mod verification;

pub use email::{Email, EmailError};
pub use id::*;
pub use promotion::{NormalizedPromotion, PromotionError, PromotionRecord};
pub use route_exception::RouteException;
pub use status::*;
pub use stock::{StockRecord, StockRecordError, StockSyncBatch};
pub use store::{ACM_UUID_HEADER, StoreUuid};
pub use sync::SyncResponse;
pub use verification::{StoreMapping, UpstreamStoreConfig, VerificationReport};
