//! Hookline Serve - HTTP ingest service for signed webhook events.
//!
//! This crate receives webhook deliveries from two upstream providers (a
//! platform-event source and an analytics-event source), verifies each
//! request's HMAC signature, classifies the user/anonymous identifiers
//! embedded in every event, emits metrics and structured warnings for
//! malformed identifiers, and retains a bounded recent history of events
//! in SQLite for inspection.
//!
//! # Architecture
//!
//! - **AppState**: Shared application state (SQLite connection, configuration)
//! - **Pipeline**: The per-request ingest-classify-persist-trim flow
//! - **Store**: Event history and the suspect-identifier alias registry
//! - **Auth**: Bearer token middleware for the inspection endpoints
//! - **Routes**: Endpoint handlers

mod auth;
mod error;
mod pipeline;
mod routes;
mod state;
pub mod store;

pub use self::auth::require_auth;
pub use self::error::ApiError;
pub use self::pipeline::{ingest, IngestOutcome, WebhookSource};
pub use self::routes::router;
pub use self::state::{AppState, Config};
pub use self::store::{AliasEntry, AliasRegistry, EventStore};
