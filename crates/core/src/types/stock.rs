//! Stock records pushed by the commerce backend.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::flag::flag_from_value;
use super::store::StoreUuid;

/// Reasons a single stock record cannot be applied.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StockRecordError {
    #[error("stock record is not an object")]
    NotAnObject,
    #[error("stock record has no sku")]
    MissingSku,
    #[error("invalid quantity {0:?}")]
    InvalidQuantity(String),
}

/// Stock level of one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub sku: String,
    pub qty: Decimal,
    pub is_in_stock: bool,
}

impl StockRecord {
    /// Decode a record from the loosely typed push payload.
    ///
    /// `qty` may be a number or numeric string and defaults to zero;
    /// `is_in_stock` accepts any flag encoding and defaults to `qty > 0`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object, `sku` is missing or
    /// blank, or `qty` is not numeric.
    pub fn from_value(value: &Value) -> Result<Self, StockRecordError> {
        let map = value.as_object().ok_or(StockRecordError::NotAnObject)?;

        let sku = match map.get("sku") {
            Some(Value::String(s)) => s.trim().to_owned(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        if sku.is_empty() {
            return Err(StockRecordError::MissingSku);
        }

        let qty = match map.get("qty") {
            None | Some(Value::Null) => Decimal::ZERO,
            Some(Value::Number(n)) => parse_decimal(&n.to_string())?,
            Some(Value::String(s)) => parse_decimal(s.trim())?,
            Some(other) => return Err(StockRecordError::InvalidQuantity(other.to_string())),
        };

        let is_in_stock = map
            .get("is_in_stock")
            .and_then(flag_from_value)
            .unwrap_or(qty > Decimal::ZERO);

        Ok(Self {
            sku,
            qty,
            is_in_stock,
        })
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal, StockRecordError> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| StockRecordError::InvalidQuantity(raw.to_owned()))
}

/// A stock push: the originating store plus its raw records.
///
/// Records stay undecoded so one malformed entry fails on its own instead of
/// rejecting the whole push.
#[derive(Debug, Clone, PartialEq)]
pub struct StockSyncBatch {
    pub store: StoreUuid,
    pub records: Vec<Value>,
}

impl StockSyncBatch {
    /// Build a batch from a push body of the form `{ "sku": [ ... ] }`.
    ///
    /// Returns `None` when the body has no `sku` list; that is a structural
    /// error of the whole request.
    #[must_use]
    pub fn from_body(store: StoreUuid, body: &Value) -> Option<Self> {
        let records = body.get("sku")?.as_array()?.clone();
        Some(Self { store, records })
    }
}
