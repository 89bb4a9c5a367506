//! HTTP implementation of [`CommerceApi`].

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use commerce_connector_core::{ACM_UUID_HEADER, RouteException, StoreUuid, UpstreamStoreConfig};

use super::{CommerceApi, operations};
use crate::config::CommerceApiConfig;

/// Longest response body kept in an exception message.
const MAX_ERROR_BODY: usize = 1024;

/// Commerce backend client over HTTP.
#[derive(Clone)]
pub struct HttpCommerceApi {
    http: Client,
    base_url: Url,
    token: SecretString,
}

impl std::fmt::Debug for HttpCommerceApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCommerceApi")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ProductSyncRequest<'a> {
    acm_uuid: &'a str,
    skus: &'a [String],
}

impl HttpCommerceApi {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed (TLS backend
    /// initialization failure).
    pub fn new(config: &CommerceApiConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("commerce-connector/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.connector_api_url.clone(),
            token: config.api_token.clone(),
        })
    }

    /// Build an endpoint URL from path segments, percent-encoding each one.
    fn endpoint(&self, operation: &str, segments: &[&str]) -> Result<Url, RouteException> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                RouteException::new(
                    operation,
                    RouteException::NO_RESPONSE,
                    format!("base URL {} cannot carry a path", self.base_url),
                )
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        store: &StoreUuid,
        url: Url,
    ) -> Result<T, RouteException> {
        debug!(operation, %url, "Calling commerce backend");
        let response = self
            .http
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .header(ACM_UUID_HEADER, store.as_str())
            .send()
            .await
            .map_err(|e| transport_error(operation, &e))?;

        let response = ensure_success(operation, response).await?;
        let status = response.status();
        response
            .json::<T>()
            .await
            .map_err(|e| RouteException::new(operation, status.as_u16(), format!("invalid response body: {e}")))
    }
}

#[async_trait]
impl CommerceApi for HttpCommerceApi {
    #[instrument(skip(self), fields(store = %store))]
    async fn store_config(&self, store: &StoreUuid) -> Result<UpstreamStoreConfig, RouteException> {
        let operation = operations::STORE_CONFIG;
        let url = self.endpoint(operation, &["v1", "store", store.as_str(), "config"])?;
        self.get_json(operation, store, url).await
    }

    #[instrument(skip(self, skus), fields(store = %store, skus = skus.len()))]
    async fn request_product_sync(
        &self,
        store: &StoreUuid,
        skus: &[String],
    ) -> Result<(), RouteException> {
        let operation = operations::PRODUCT_FULL_SYNC;
        let url = self.endpoint(operation, &["v1", "ingest", "product", "sync"])?;

        let response = self
            .http
            .post(url)
            .bearer_auth(self.token.expose_secret())
            .header(ACM_UUID_HEADER, store.as_str())
            .json(&ProductSyncRequest {
                acm_uuid: store.as_str(),
                skus,
            })
            .send()
            .await
            .map_err(|e| transport_error(operation, &e))?;

        ensure_success(operation, response).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(store = %store))]
    async fn fetch_promotions(&self, store: &StoreUuid) -> Result<Vec<Value>, RouteException> {
        let operation = operations::PROMOTIONS;
        let url = self.endpoint(operation, &["v1", "store", store.as_str(), "promotions"])?;
        self.get_json(operation, store, url).await
    }
}

fn transport_error(operation: &str, error: &reqwest::Error) -> RouteException {
    let code = error
        .status()
        .map_or(RouteException::NO_RESPONSE, |s: StatusCode| s.as_u16());
    RouteException::new(operation, code, error.to_string())
}

async fn ensure_success(operation: &str, response: Response) -> Result<Response, RouteException> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    if body.trim().is_empty() {
        body = status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned();
    }

    Err(RouteException::new(operation, status.as_u16(), body))
}
