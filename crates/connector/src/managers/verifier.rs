//! Store mapping verification against the commerce backend.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use commerce_connector_core::{RouteException, StoreMapping, StoreUuid, VerificationReport};

use super::MappingVerifier;
use crate::api::CommerceApi;

/// Verifies configured store mappings by asking the backend for its view
/// of the store on every call. Nothing is cached.
pub struct ApiMappingVerifier {
    stores: Vec<StoreMapping>,
    api: Arc<dyn CommerceApi>,
    system_api_url: String,
    connector_api_url: String,
}

impl ApiMappingVerifier {
    #[must_use]
    pub fn new(
        stores: Vec<StoreMapping>,
        api: Arc<dyn CommerceApi>,
        system_api_url: impl Into<String>,
        connector_api_url: impl Into<String>,
    ) -> Self {
        Self {
            stores,
            api,
            system_api_url: system_api_url.into(),
            connector_api_url: connector_api_url.into(),
        }
    }

    fn mapping(&self, store: &StoreUuid) -> Option<&StoreMapping> {
        self.stores.iter().find(|m| m.acm_uuid == store.as_str())
    }

    fn failed(&self, store: &StoreUuid, advice: &str) -> VerificationReport {
        VerificationReport::failed(store, &self.system_api_url, &self.connector_api_url, advice)
    }
}

#[async_trait]
impl MappingVerifier for ApiMappingVerifier {
    #[instrument(skip(self), fields(store = %store))]
    async fn verify(&self, store: &StoreUuid) -> Result<VerificationReport, RouteException> {
        if store.is_unspecified() {
            warn!("Verification requested without a store");
            return Ok(self.failed(
                store,
                "No X-ACM-UUID header was sent; the store cannot be identified.",
            ));
        }

        let Some(mapping) = self.mapping(store) else {
            warn!("Verification requested for an unmapped store");
            return Ok(self.failed(
                store,
                "This store is not mapped on the connector. Add it to the store settings.",
            ));
        };

        let upstream = self.api.store_config(store).await?;
        let report = VerificationReport::compare(
            mapping,
            &upstream,
            &self.system_api_url,
            &self.connector_api_url,
        );
        info!(passed = report.passed_verification, "Store mapping verified");
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use commerce_connector_core::UpstreamStoreConfig;
    use serde_json::Value;

    use super::*;

    struct FakeApi {
        calls: AtomicUsize,
        currency: &'static str,
    }

    #[async_trait]
    impl CommerceApi for FakeApi {
        async fn store_config(
            &self,
            _store: &StoreUuid,
        ) -> Result<UpstreamStoreConfig, RouteException> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(UpstreamStoreConfig {
                store_id: "1".to_owned(),
                store_code: "en".to_owned(),
                website_id: "1".to_owned(),
                website_code: "base".to_owned(),
                locale: "en_US".to_owned(),
                base_currency_code: self.currency.to_owned(),
            })
        }

        async fn request_product_sync(
            &self,
            _store: &StoreUuid,
            _skus: &[String],
        ) -> Result<(), RouteException> {
            Ok(())
        }

        async fn fetch_promotions(&self, _store: &StoreUuid) -> Result<Vec<Value>, RouteException> {
            Ok(Vec::new())
        }
    }

    fn verifier(currency: &'static str) -> (ApiMappingVerifier, Arc<FakeApi>) {
        let api = Arc::new(FakeApi {
            calls: AtomicUsize::new(0),
            currency,
        });
        let mapping = StoreMapping {
            acm_uuid: "uuid-en".to_owned(),
            store_id: "1".to_owned(),
            store_code: "en".to_owned(),
            website_id: "1".to_owned(),
            website_code: "base".to_owned(),
            locale: "en_us".to_owned(),
            currency: "usd".to_owned(),
            description: "English store".to_owned(),
        };
        (
            ApiMappingVerifier::new(vec![mapping], api.clone(), "https://sys/", "https://conn/"),
            api,
        )
    }

    #[tokio::test]
    async fn test_matching_mapping_passes() {
        let (verifier, _) = verifier("USD");
        let report = verifier.verify(&StoreUuid::new("uuid-en")).await.unwrap();
        assert!(report.passed_verification);
        assert_eq!(report.case_currency, "USD");
        assert_eq!(report.system_api_url, "https://sys/");
    }

    #[tokio::test]
    async fn test_every_call_hits_backend() {
        let (verifier, api) = verifier("EUR");
        let store = StoreUuid::new("uuid-en");

        assert!(!verifier.verify(&store).await.unwrap().passed_verification);
        assert!(!verifier.verify(&store).await.unwrap().passed_verification);
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_or_missing_store_fails_without_backend_call() {
        let (verifier, api) = verifier("USD");

        let report = verifier.verify(&StoreUuid::unspecified()).await.unwrap();
        assert!(!report.passed_verification);

        let report = verifier.verify(&StoreUuid::new("other")).await.unwrap();
        assert!(!report.passed_verification);
        assert_eq!(report.acm_uuid, "other");

        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }
}
