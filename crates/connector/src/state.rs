//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use commerce_connector_core::StoreMapping;

use crate::api::{CommerceApi, HttpCommerceApi};
use crate::config::{ConnectorConfig, QueueConfig};
use crate::db::{self, PgCustomerManager, PgProductManager, PgPromotionQueue, PgPromotionsManager};
use crate::managers::{
    ApiMappingVerifier, CustomerManager, MappingVerifier, ProductManager, PromotionsManager,
};
use crate::memory::MemoryStore;
use crate::notices::Notices;
use crate::queue::{PromotionQueue, PromotionQueueBase, QueueRunner};
use crate::route_exception::RouteExceptionHandler;
use crate::settings::ConnectorSettings;

/// The managers and clients the resources depend on.
#[derive(Clone)]
pub struct Services {
    pub api: Arc<dyn CommerceApi>,
    pub products: Arc<dyn ProductManager>,
    pub customers: Arc<dyn CustomerManager>,
    pub promotions: Arc<dyn PromotionsManager>,
    pub queue: Arc<dyn PromotionQueue>,
    pub verifier: Arc<dyn MappingVerifier>,
    /// Backend URLs echoed in verification reports.
    pub system_api_url: String,
    pub connector_api_url: String,
}

impl Services {
    /// Postgres-backed services talking to the real commerce backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn postgres(
        config: &ConnectorConfig,
        settings: &ConnectorSettings,
        pool: &PgPool,
    ) -> Result<Self, reqwest::Error> {
        let api: Arc<dyn CommerceApi> = Arc::new(HttpCommerceApi::new(&config.commerce)?);
        let system_api_url = config.commerce.system_api_url.to_string();
        let connector_api_url = config.commerce.connector_api_url.to_string();
        Ok(Self {
            verifier: Arc::new(ApiMappingVerifier::new(
                settings.stores.clone(),
                api.clone(),
                system_api_url.as_str(),
                connector_api_url.as_str(),
            )),
            api,
            products: Arc::new(PgProductManager::new(pool.clone())),
            customers: Arc::new(PgCustomerManager::new(pool.clone())),
            promotions: Arc::new(PgPromotionsManager::new(pool.clone())),
            queue: Arc::new(PgPromotionQueue::new(pool.clone())),
            system_api_url,
            connector_api_url,
        })
    }

    /// Services backed by a [`MemoryStore`].
    #[must_use]
    pub fn memory(
        store: &Arc<MemoryStore>,
        api: Arc<dyn CommerceApi>,
        stores: Vec<StoreMapping>,
        system_api_url: &str,
        connector_api_url: &str,
    ) -> Self {
        Self {
            verifier: Arc::new(ApiMappingVerifier::new(
                stores,
                api.clone(),
                system_api_url,
                connector_api_url,
            )),
            api,
            products: store.clone(),
            customers: store.clone(),
            promotions: store.clone(),
            queue: store.clone(),
            system_api_url: system_api_url.to_owned(),
            connector_api_url: connector_api_url.to_owned(),
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    settings: ConnectorSettings,
    services: Services,
    notices: Arc<Notices>,
    route_exceptions: Arc<RouteExceptionHandler>,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// `pool` is only used for readiness checks; without one the state is
    /// always ready.
    #[must_use]
    pub fn new(settings: ConnectorSettings, services: Services, pool: Option<PgPool>) -> Self {
        let notices = Arc::new(Notices::default());
        let route_exceptions = Arc::new(RouteExceptionHandler::new(
            settings.route_exceptions.clone(),
            notices.clone(),
        ));

        Self {
            inner: Arc::new(AppStateInner {
                settings,
                services,
                notices,
                route_exceptions,
                pool,
            }),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ConnectorSettings {
        &self.inner.settings
    }

    #[must_use]
    pub fn api(&self) -> &dyn CommerceApi {
        self.inner.services.api.as_ref()
    }

    #[must_use]
    pub fn products(&self) -> &dyn ProductManager {
        self.inner.services.products.as_ref()
    }

    #[must_use]
    pub fn customers(&self) -> &dyn CustomerManager {
        self.inner.services.customers.as_ref()
    }

    #[must_use]
    pub fn promotions(&self) -> &dyn PromotionsManager {
        self.inner.services.promotions.as_ref()
    }

    #[must_use]
    pub fn queue(&self) -> &dyn PromotionQueue {
        self.inner.services.queue.as_ref()
    }

    #[must_use]
    pub fn verifier(&self) -> &dyn MappingVerifier {
        self.inner.services.verifier.as_ref()
    }

    /// `(system_api_url, connector_api_url)` as reported to the backend.
    #[must_use]
    pub fn api_urls(&self) -> (&str, &str) {
        let services = &self.inner.services;
        (&services.system_api_url, &services.connector_api_url)
    }

    #[must_use]
    pub fn notices(&self) -> &Notices {
        &self.inner.notices
    }

    #[must_use]
    pub fn route_exceptions(&self) -> &RouteExceptionHandler {
        &self.inner.route_exceptions
    }

    /// Whether the storage backend answers.
    pub async fn is_ready(&self) -> bool {
        match &self.inner.pool {
            Some(pool) => db::ping(pool).await.is_ok(),
            None => true,
        }
    }

    /// Build a queue runner over this state's queue and managers.
    #[must_use]
    pub fn queue_runner(&self, config: QueueConfig) -> QueueRunner {
        let services = &self.inner.services;
        let base = PromotionQueueBase::new(
            services.api.clone(),
            services.products.clone(),
            services.promotions.clone(),
        );
        QueueRunner::new(
            services.queue.clone(),
            &base,
            self.inner.route_exceptions.clone(),
            config,
        )
    }
}
