//! Ingestion of pushed (or pulled) backend data.
//!
//! These functions hold the per-record loops shared by the sync resources
//! and the operator pull actions. A failing record is logged and counted;
//! it never aborts the rest of the batch.

mod promotions;
mod stock;

use serde::Serialize;

pub use promotions::{PromotionSyncReport, ingest_promotions, promotion_records, pull_promotions};
pub use stock::sync_stock;

/// Per-record counts of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub failed: usize,
}
