//! Commerce Connector library.
//!
//! This crate provides the connector service as a library so the binary, the
//! CLI and the integration tests all build the same router and state.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod managers;
pub mod memory;
pub mod middleware;
pub mod notices;
pub mod queue;
pub mod route_exception;
pub mod routes;
pub mod settings;
pub mod state;
pub mod sync;
pub mod telemetry;
