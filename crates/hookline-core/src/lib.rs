//! Core types, validation, and shared utilities for the Hookline webhook consumer.
//!
//! This crate provides:
//! - Webhook payload model with derived-field accessors ([`WebhookPayload`])
//! - Payload normalization for single and batched request bodies
//! - Identifier format classification ([`IdFormat`], [`IdReport`])
//! - HMAC signature verification for both upstream providers
//! - Per-request metric batching and Prometheus helpers
//! - Shared error types

mod classify;
mod error;
mod event;
pub mod metrics;
mod signature;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Default number of most-recently-created events retained in the store.
/// Older events are permanently discarded by the retention trim.
pub const DEFAULT_RETENTION_LIMIT: u32 = 100;

/// Batch wrapper key used by the analytics provider for bundled deliveries.
pub const BATCH_WRAPPER_KEY: &str = "_json";

/// Envelope key holding the inner event payload.
pub const ENVELOPE_KEY: &str = "webhook";

pub use classify::{
    load_exclusion_list, IdFormat, IdKind, IdReport, ANONYMOUS_ID_FAKE_GUID, ANONYMOUS_ID_INVALID,
    USER_ID_FAKE_GUID, USER_ID_INVALID,
};
pub use error::{Error, Result};
pub use event::{normalize, WebhookPayload};
pub use signature::{verify_analytics_signature, verify_platform_signature};
