//! Integration tests for the commerce connector.
//!
//! Every test builds the real router over the in-memory managers and a
//! scripted commerce backend, so no database or network is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p commerce-connector-integration-tests
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;
use tracing::{Event, Level, Subscriber, subscriber::DefaultGuard};
use tracing_subscriber::{
    layer::{Context, Layer, SubscriberExt},
    registry::Registry,
};

use commerce_connector::api::CommerceApi;
use commerce_connector::memory::{MemoryStore, StubCommerceApi};
use commerce_connector::routes;
use commerce_connector::settings::ConnectorSettings;
use commerce_connector::state::{AppState, Services};
use commerce_connector_core::{ACM_UUID_HEADER, UpstreamStoreConfig};

/// Store every test pushes for.
pub const STORE: &str = "uuid-en";
pub const SYSTEM_API_URL: &str = "https://system.example.test/";
pub const CONNECTOR_API_URL: &str = "https://connector.example.test/";

/// Settings shared by the tests.
pub const SETTINGS: &str = r#"
route_exceptions:
  default:
    message: "The commerce backend is unavailable."
    log: true
  routes:
    promotions:
      message: "Promotions could not be fetched."
      redirect: /admin/promotions
stores:
  - acm_uuid: uuid-en
    store_id: "1"
    store_code: en
    website_id: "1"
    website_code: base
    locale: en_US
    currency: USD
    description: English
"#;

/// The backend's view of [`STORE`], matching [`SETTINGS`].
#[must_use]
pub fn upstream_config() -> UpstreamStoreConfig {
    UpstreamStoreConfig {
        store_id: "1".to_owned(),
        store_code: "en".to_owned(),
        website_id: "1".to_owned(),
        website_code: "base".to_owned(),
        locale: "en_US".to_owned(),
        base_currency_code: "USD".to_owned(),
    }
}

/// A response with its body collected.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    /// The body as JSON; `Value::Null` when it is not JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    /// A header as text, if present.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Router, state and fakes of one test.
pub struct TestContext {
    pub memory: Arc<MemoryStore>,
    pub api: Arc<StubCommerceApi>,
    pub state: AppState,
    pub app: Router,
}

impl TestContext {
    /// A context using [`SETTINGS`], with the backend knowing [`STORE`].
    ///
    /// # Panics
    ///
    /// Panics if the settings or the registration table are invalid.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(SETTINGS)
    }

    /// A context using the given settings YAML.
    ///
    /// # Panics
    ///
    /// Panics if the settings or the registration table are invalid.
    #[must_use]
    pub fn with_settings(yaml: &str) -> Self {
        let settings = ConnectorSettings::from_yaml(yaml).expect("valid test settings");
        let memory = Arc::new(MemoryStore::new());
        let api = Arc::new(StubCommerceApi::new());
        api.set_store_config(STORE, upstream_config());

        let services = Services::memory(
            &memory,
            api.clone() as Arc<dyn CommerceApi>,
            settings.stores.clone(),
            SYSTEM_API_URL,
            CONNECTOR_API_URL,
        );
        let state = AppState::new(settings, services, None);
        let app = routes::router(state.clone()).expect("valid registration table");

        Self {
            memory,
            api,
            state,
            app,
        }
    }

    /// Send a request through the router.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// POST a raw body for a store.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built.
    pub async fn post(&self, path: &str, store: Option<&str>, body: &str) -> TestResponse {
        let mut builder = Request::post(path).header(header::CONTENT_TYPE, "application/json");
        if let Some(store) = store {
            builder = builder.header(ACM_UUID_HEADER, store);
        }
        self.send(builder.body(Body::from(body.to_owned())).expect("valid request"))
            .await
    }

    /// GET a path for a store.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built.
    pub async fn get(&self, path: &str, store: Option<&str>) -> TestResponse {
        let mut builder = Request::get(path);
        if let Some(store) = store {
            builder = builder.header(ACM_UUID_HEADER, store);
        }
        self.send(builder.body(Body::empty()).expect("valid request"))
            .await
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts log events emitted by the connector, by level.
#[derive(Debug, Clone, Default)]
pub struct LogCounter {
    counts: Arc<Mutex<[usize; 5]>>,
}

fn level_index(level: Level) -> usize {
    match level {
        Level::ERROR => 0,
        Level::WARN => 1,
        Level::INFO => 2,
        Level::DEBUG => 3,
        Level::TRACE => 4,
    }
}

impl LogCounter {
    /// Install the counter as the subscriber of the current thread.
    ///
    /// Use with `#[tokio::test]` (current-thread runtime) so handler logs
    /// are seen.
    #[must_use]
    pub fn install(&self) -> DefaultGuard {
        tracing::subscriber::set_default(Registry::default().with(self.clone()))
    }

    /// Events seen at exactly `level`.
    #[must_use]
    pub fn count(&self, level: Level) -> usize {
        let counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.get(level_index(level)).copied().unwrap_or_default()
    }
}

impl<S: Subscriber> Layer<S> for LogCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with("commerce_connector") {
            return;
        }
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = counts.get_mut(level_index(*metadata.level())) {
            *count += 1;
        }
    }
}
