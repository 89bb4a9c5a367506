//! Commerce Connector Core - Shared types library.
//!
//! This crate provides the types shared by every connector component:
//! - `connector` - HTTP service receiving pushes from the commerce backend
//! - `cli` - Command-line tools for migrations, queue processing and verification
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Payload normalization lives here so that every
//! entry point (push endpoints, operator pulls, queue workers) shapes records
//! the same way.
//!
//! # Modules
//!
//! - [`types`] - Newtypes, sync payloads, the route exception and response shapes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
