//! HTTP resources of the connector.
//!
//! # Route Structure
//!
//! ```text
//! # Commerce backend pushes (always HTTP 200 + {success})
//! POST /productstocksync       - Stock levels for a store
//! POST /promotionsync          - Promotion records
//! POST /customer/delete        - Delete a customer by email
//! GET  /acquia/verify          - Store mapping verification (never cached)
//!
//! # Operator actions
//! GET  /admin                  - Stores, queue backlog and pending notices
//! POST /admin/sync/products    - Ask the backend for a full product push
//! POST /admin/sync/promotions  - Pull and ingest every promotion
//! GET  /notices                - Drain transient notices
//!
//! # Health
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (database)
//! ```
//!
//! Every resource is declared in [`resources`]; the router is folded from
//! that table after [`validate`] has checked ids and routes are unique.

pub mod admin;
pub mod customers;
pub mod health;
pub mod notices;
pub mod promotions;
pub mod stock;
pub mod verify;

use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use std::time::Duration;

use axum::{
    Router,
    body::Bytes,
    http::{HeaderValue, Request, Response, header},
    middleware,
    routing::{MethodFilter, MethodRouter, get, on},
};
use serde_json::Value;
use thiserror::Error;
use tower_http::{
    set_header::SetResponseHeaderLayer,
    trace::{DefaultOnResponse, OnResponse, TraceLayer},
};
use tracing::Span;

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// HTTP method a resource answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceMethod {
    Get,
    Post,
}

impl ResourceMethod {
    const fn filter(self) -> MethodFilter {
        match self {
            Self::Get => MethodFilter::GET,
            Self::Post => MethodFilter::POST,
        }
    }
}

impl fmt::Display for ResourceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// One entry of the registration table.
pub struct Resource {
    pub id: &'static str,
    pub path: &'static str,
    pub method: ResourceMethod,
    handler: MethodRouter<AppState>,
}

impl Resource {
    /// Register `handler` for `method` on `path`.
    pub fn new<H, T>(id: &'static str, path: &'static str, method: ResourceMethod, handler: H) -> Self
    where
        H: axum::handler::Handler<T, AppState>,
        T: 'static,
    {
        Self {
            id,
            path,
            method,
            handler: on(method.filter(), handler),
        }
    }

    /// Forbid caching of every response of this resource.
    #[must_use]
    pub fn no_cache(mut self) -> Self {
        self.handler = self
            .handler
            .layer::<_, Infallible>(SetResponseHeaderLayer::overriding(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-store, no-cache, max-age=0"),
            ))
            .layer::<_, Infallible>(SetResponseHeaderLayer::overriding(
                header::PRAGMA,
                HeaderValue::from_static("no-cache"),
            ));
        self
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// A registration table that cannot be turned into a router.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("resource id {0} registered twice")]
    DuplicateId(&'static str),

    #[error("route {method} {path} registered twice")]
    DuplicateRoute {
        method: ResourceMethod,
        path: &'static str,
    },
}

/// Every resource the connector serves, health checks excluded.
#[must_use]
pub fn resources() -> Vec<Resource> {
    use ResourceMethod::{Get, Post};

    vec![
        Resource::new("acq_productstocksync", "/productstocksync", Post, stock::product_stock_sync),
        Resource::new("acq_promotionsync", "/promotionsync", Post, promotions::promotion_sync),
        Resource::new("acq_customerdelete", "/customer/delete", Post, customers::customer_delete),
        Resource::new("acq_verify", "/acquia/verify", Get, verify::verify_mapping).no_cache(),
        Resource::new("admin_overview", "/admin", Get, admin::overview),
        Resource::new("admin_sync_products", "/admin/sync/products", Post, admin::sync_products),
        Resource::new("admin_sync_promotions", "/admin/sync/promotions", Post, admin::sync_promotions),
        Resource::new("notices", "/notices", Get, notices::drain),
    ]
}

/// Check that ids and `(method, path)` pairs are unique.
///
/// # Errors
///
/// Returns the first duplicate found, in table order.
pub fn validate(resources: &[Resource]) -> Result<(), RegistryError> {
    let mut ids = HashSet::new();
    let mut routes = HashSet::new();

    for resource in resources {
        if !ids.insert(resource.id) {
            return Err(RegistryError::DuplicateId(resource.id));
        }
        if !routes.insert((resource.method, resource.path)) {
            return Err(RegistryError::DuplicateRoute {
                method: resource.method,
                path: resource.path,
            });
        }
    }
    Ok(())
}

/// Fold a validated table into a router.
///
/// # Errors
///
/// Returns a [`RegistryError`] when the table has duplicates.
pub fn register(resources: Vec<Resource>) -> Result<Router<AppState>, RegistryError> {
    validate(&resources)?;

    let router = resources.into_iter().fold(Router::new(), |router, resource| {
        tracing::debug!(id = resource.id, method = %resource.method, path = resource.path, "Registering resource");
        router.route(resource.path, resource.handler)
    });

    Ok(router
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready)))
}

/// Build the application router with middleware and state.
///
/// # Errors
///
/// Returns a [`RegistryError`] when the registration table has duplicates.
pub fn router(state: AppState) -> Result<Router, RegistryError> {
    let router = register(resources())?
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    span.record(
                        "latency_ms",
                        u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                    );
                    DefaultOnResponse::default().on_response(response, latency, span);
                }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    Ok(router)
}

/// Parse a push body. The backend is answered with `success:false` rather
/// than a 4xx when this fails, so handlers take raw bytes.
pub(crate) fn json_body(body: &Bytes) -> Result<Value, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
}
