//! The per-request ingest pipeline.
//!
//! ```text
//! request body ──▶ signature check ──▶ normalize
//!                       │ fail: 403, no side effects
//!                       ▼
//!            for each event, in order:
//!              classify identifiers
//!              alias-suppress known fake guids
//!              buffer metric increment
//!              warn if still invalid
//!              append to store
//!                       ▼
//!            trim to retention limit
//!            flush metric batch (once)
//! ```
//!
//! Per-event side effects are isolated: a malformed payload is logged and
//! stored, never rejected, and never aborts the rest of the batch. A store
//! failure is fatal for the request and happens before the metric flush, so
//! no partial batch becomes visible.

use hookline_core::metrics::{MetricsBatch, TRIMMED_EVENTS_METRIC};
use hookline_core::{
    normalize, verify_analytics_signature, verify_platform_signature, IdFormat, IdReport,
    WebhookPayload,
};
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::AliasRegistry;

/// Which upstream provider a request came from; selects the signature
/// protocol and the per-source logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookSource {
    /// Platform (app lifecycle) source: HMAC-SHA256, base64.
    Platform,
    /// Analytics (user behavior) source: HMAC-SHA1, hex.
    Analytics,
}

/// Summary of one processed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Events appended to the store.
    pub stored: usize,
    /// Events that failed identifier validation and were warned about.
    pub warnings: usize,
    /// Counter increments flushed for the request.
    pub metric_increments: usize,
}

/// Run the full ingest pipeline for one inbound request.
pub fn ingest(
    state: &AppState,
    source: WebhookSource,
    body: &[u8],
    signature: Option<&str>,
) -> Result<IngestOutcome, ApiError> {
    let verified = match source {
        WebhookSource::Platform => {
            verify_platform_signature(state.config.platform_secret.as_bytes(), body, signature)
        }
        WebhookSource::Analytics => {
            verify_analytics_signature(state.config.analytics_secret.as_bytes(), body, signature)
        }
    };
    if !verified {
        return Err(ApiError::SignatureMismatch);
    }

    let decoded: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("request body is not valid JSON: {e}")))?;

    let events = normalize(decoded);
    let store = state.events();
    let registry = state.aliases();
    let mut batch = MetricsBatch::new();

    let mut stored = 0usize;
    let mut warnings = 0usize;

    for payload in events {
        let report = IdReport::from_payload(&payload);
        let suppressed = user_id_suppressed(state, &registry, &payload, &report)?;

        batch.record_event(&payload, &report);

        if !report.is_valid(suppressed) {
            warnings += 1;
            warn_invalid(&payload, &report, suppressed);
        }

        store.append(payload.as_value())?;
        stored += 1;

        if source == WebhookSource::Platform {
            log_platform_event(&payload);
        }
    }

    let trimmed = store.trim_to_recent(state.config.retention_limit)?;
    if trimmed > 0 {
        batch.record(TRIMMED_EVENTS_METRIC, Vec::new());
    }

    let metric_increments = batch.pending().len();
    batch.flush();

    Ok(IngestOutcome {
        stored,
        warnings,
        metric_increments,
    })
}

/// Whether alerting for a fake-guid user identifier is suppressed.
///
/// Registers the value in the alias registry on first sight so operators
/// have something to reconcile; suppression applies once an operator has
/// recorded a canonical mapping, or when the value is on the startup
/// exclusion list.
fn user_id_suppressed(
    state: &AppState,
    registry: &AliasRegistry,
    payload: &WebhookPayload,
    report: &IdReport,
) -> Result<bool, ApiError> {
    if report.user_id_format != IdFormat::FakeGuid {
        return Ok(false);
    }
    let Some(user_id) = payload.user_id() else {
        return Ok(false);
    };

    if state.config.excluded_ids.contains(user_id) {
        return Ok(true);
    }

    registry.find_or_create(user_id)?;
    let entry = registry.lookup(user_id)?;
    Ok(entry.is_some_and(|e| e.is_aliased()))
}

/// Emit one structured warning for an event that failed validation.
/// Logging never fails the request.
fn warn_invalid(payload: &WebhookPayload, report: &IdReport, suppressed: bool) {
    let error_codes = report.error_codes(suppressed);
    tracing::warn!(
        event = "event.invalid_ids",
        error_codes = ?error_codes,
        payload = %payload.as_value(),
        "webhook event carries malformed identifiers"
    );
}

/// Structured info log for a stored platform event, mirroring what the
/// platform provider triggered and who triggered it.
fn log_platform_event(payload: &WebhookPayload) {
    tracing::info!(
        application = %payload.application(),
        evt_name = %payload.event_name_past_tense(),
        payload = %payload.as_value(),
        usr = %payload.actor(),
        "platform triggered resource: {} action: {}",
        payload.resource(),
        payload.action()
    );
}
