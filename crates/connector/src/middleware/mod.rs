//! HTTP middleware and extractors for the connector.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (correlate logs, Sentry events and responses)
//!
//! Per-resource layers (e.g. no-cache headers on verification) are attached
//! to the resource's method router in [`crate::routes`].

pub mod request_id;
pub mod store;

pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use store::AcmStore;
