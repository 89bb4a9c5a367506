//! Promotion records pushed (or pulled) from the commerce backend.
//!
//! The backend sends promotions keyed on `code` with an `enabled` flag, while
//! the local store keys them on `rule_id` with a `status` flag and a display
//! `name`. [`PromotionRecord::normalize`] bridges the two shapes:
//!
//! ```text
//! name    ??= code
//! rule_id ??= code
//! status  ??= enabled   (then false)
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::flag;
use super::status::PromotionType;

/// Errors that prevent a promotion record from being normalized.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PromotionError {
    /// `code` is absent or blank.
    #[error("promotion record has no code")]
    MissingCode,
    /// The record is not a JSON object or has mistyped fields.
    #[error("malformed promotion record: {0}")]
    Malformed(String),
}

/// A promotion as the backend sends it.
///
/// Every field except `code` is optional; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRecord {
    /// Backend promotion code.
    #[serde(default)]
    pub code: Option<String>,
    /// Display label.
    #[serde(default)]
    pub name: Option<String>,
    /// Secondary identifier used as the local key.
    #[serde(default)]
    pub rule_id: Option<String>,
    /// Backend enabled flag.
    #[serde(default, deserialize_with = "flag::lenient")]
    pub enabled: Option<bool>,
    /// Local status flag, if the backend already sent one.
    #[serde(default, deserialize_with = "flag::lenient")]
    pub status: Option<bool>,
    /// SKUs the promotion applies to.
    #[serde(default, deserialize_with = "deserialize_skus")]
    pub sku: Vec<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Promotion kind.
    #[serde(default, rename = "type")]
    pub promotion_type: Option<PromotionType>,
}

/// A promotion shaped for the local promotions manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedPromotion {
    pub code: String,
    pub name: String,
    pub rule_id: String,
    pub status: bool,
    /// Deduplicated SKUs, in first-seen order.
    pub skus: Vec<String>,
    pub description: Option<String>,
    pub promotion_type: PromotionType,
}

impl PromotionRecord {
    /// Decode a record from an arbitrary JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`PromotionError::Malformed`] if the value is not an object or a
    /// known field has the wrong JSON type.
    pub fn from_value(value: Value) -> Result<Self, PromotionError> {
        if !value.is_object() {
            return Err(PromotionError::Malformed("expected an object".to_owned()));
        }
        serde_json::from_value(value).map_err(|e| PromotionError::Malformed(e.to_string()))
    }

    /// Fill in the fields the local store requires.
    ///
    /// Blank strings count as absent, so `name: ""` is replaced by `code`.
    ///
    /// # Errors
    ///
    /// Returns [`PromotionError::MissingCode`] if `code` is absent or blank.
    pub fn normalize(self) -> Result<NormalizedPromotion, PromotionError> {
        let code = non_blank(self.code).ok_or(PromotionError::MissingCode)?;
        let name = non_blank(self.name).unwrap_or_else(|| code.clone());
        let rule_id = non_blank(self.rule_id).unwrap_or_else(|| code.clone());
        let status = self.status.or(self.enabled).unwrap_or(false);

        let mut skus: Vec<String> = Vec::with_capacity(self.sku.len());
        for sku in self.sku {
            let sku = sku.trim();
            if !sku.is_empty() && !skus.iter().any(|s| s == sku) {
                skus.push(sku.to_owned());
            }
        }

        Ok(NormalizedPromotion {
            code,
            name,
            rule_id,
            status,
            skus,
            description: non_blank(self.description),
            promotion_type: self.promotion_type.unwrap_or_default(),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Accept `sku` as a list of strings, a list of `{ "sku": .. }` objects, a
/// single string, or null.
fn deserialize_skus<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    fn sku_of(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Object(map) => map.get("sku").and_then(sku_of),
            _ => None,
        }
    }

    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.iter().filter_map(sku_of).collect(),
        Some(other) => sku_of(&other).into_iter().collect(),
        None => Vec::new(),
    })
}
