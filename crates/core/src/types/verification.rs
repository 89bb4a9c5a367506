//! Store mapping verification.
//!
//! The connector keeps a local mapping from `X-ACM-UUID` to the backend's
//! store/website/locale. Verification fetches the backend's own view of the
//! store and reports whether the two agree.

use serde::{Deserialize, Serialize};

use super::store::StoreUuid;

/// Local mapping of one store, as configured on the connector side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMapping {
    pub acm_uuid: String,
    pub store_id: String,
    pub store_code: String,
    pub website_id: String,
    pub website_code: String,
    pub locale: String,
    pub currency: String,
    #[serde(default)]
    pub description: String,
}

/// The backend's description of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamStoreConfig {
    pub store_id: String,
    pub store_code: String,
    pub website_id: String,
    pub website_code: String,
    pub locale: String,
    pub base_currency_code: String,
}

/// Result of a verification request.
///
/// Field names are part of the wire contract with the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub acm_uuid: String,
    pub system_api_url: String,
    pub connector_api_url: String,
    pub store_id: String,
    pub store_code: String,
    pub website_id: String,
    pub website_code: String,
    pub locale: String,
    pub case_currency: String,
    pub description: String,
    pub system_advice: String,
    pub passed_verification: bool,
}

impl VerificationReport {
    /// A failed report with no store details, only advice.
    #[must_use]
    pub fn failed(
        store: &StoreUuid,
        system_api_url: &str,
        connector_api_url: &str,
        advice: impl Into<String>,
    ) -> Self {
        Self {
            acm_uuid: store.as_str().to_owned(),
            system_api_url: system_api_url.to_owned(),
            connector_api_url: connector_api_url.to_owned(),
            system_advice: advice.into(),
            passed_verification: false,
            ..Self::default()
        }
    }

    /// Compare the local mapping with the backend's store config.
    ///
    /// Codes must match exactly; locale and currency are compared
    /// case-insensitively. Store details in the report are the backend's.
    #[must_use]
    pub fn compare(
        mapping: &StoreMapping,
        upstream: &UpstreamStoreConfig,
        system_api_url: &str,
        connector_api_url: &str,
    ) -> Self {
        let mut mismatches = Vec::new();
        if mapping.store_id != upstream.store_id {
            mismatches.push(mismatch("store_id", &mapping.store_id, &upstream.store_id));
        }
        if mapping.store_code != upstream.store_code {
            mismatches.push(mismatch("store_code", &mapping.store_code, &upstream.store_code));
        }
        if mapping.website_id != upstream.website_id {
            mismatches.push(mismatch("website_id", &mapping.website_id, &upstream.website_id));
        }
        if mapping.website_code != upstream.website_code {
            mismatches.push(mismatch(
                "website_code",
                &mapping.website_code,
                &upstream.website_code,
            ));
        }
        if !mapping.locale.eq_ignore_ascii_case(&upstream.locale) {
            mismatches.push(mismatch("locale", &mapping.locale, &upstream.locale));
        }
        if !mapping
            .currency
            .eq_ignore_ascii_case(&upstream.base_currency_code)
        {
            mismatches.push(mismatch(
                "currency",
                &mapping.currency,
                &upstream.base_currency_code,
            ));
        }

        let passed = mismatches.is_empty();
        let system_advice = if passed {
            "Store mapping matches the commerce backend.".to_owned()
        } else {
            format!("Store mapping differs from the commerce backend: {}.", mismatches.join("; "))
        };

        Self {
            acm_uuid: mapping.acm_uuid.clone(),
            system_api_url: system_api_url.to_owned(),
            connector_api_url: connector_api_url.to_owned(),
            store_id: upstream.store_id.clone(),
            store_code: upstream.store_code.clone(),
            website_id: upstream.website_id.clone(),
            website_code: upstream.website_code.clone(),
            locale: upstream.locale.clone(),
            case_currency: upstream.base_currency_code.clone(),
            description: mapping.description.clone(),
            system_advice,
            passed_verification: passed,
        }
    }
}

fn mismatch(field: &str, local: &str, upstream: &str) -> String {
    format!("{field} is {local:?} locally but {upstream:?} upstream")
}
