//! Webhook ingest endpoints.
//!
//! Both endpoints receive the raw body untouched; the signature covers the
//! exact bytes on the wire, so any framework-level re-encoding would break
//! verification.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::error::ApiError;
use crate::pipeline::{ingest, WebhookSource};
use crate::state::AppState;

/// Header carrying the platform source's base64 HMAC-SHA256 tag.
pub const PLATFORM_SIGNATURE_HEADER: &str = "Heroku-Webhook-Hmac-SHA256";

/// Header carrying the analytics source's hex HMAC-SHA1 tag.
pub const ANALYTICS_SIGNATURE_HEADER: &str = "x-signature";

/// `POST /heroku/webhooks`
///
/// Ingest a single platform lifecycle event. 200 with empty body on
/// success, 403 `{"error":"signature_mismatch"}` on a bad signature.
pub async fn platform(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let signature = header_str(&headers, PLATFORM_SIGNATURE_HEADER);
    let outcome = ingest(&state, WebhookSource::Platform, &body, signature)?;
    tracing::debug!(stored = outcome.stored, "platform webhook processed");
    Ok(StatusCode::OK)
}

/// `POST /segment/webhooks`
///
/// Ingest a single analytics event or a `{"_json": [...]}` batch. 200 with
/// empty body on success, 403 `{"error":"signature_mismatch"}` on a bad
/// signature.
pub async fn analytics(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let signature = header_str(&headers, ANALYTICS_SIGNATURE_HEADER);
    let outcome = ingest(&state, WebhookSource::Analytics, &body, signature)?;
    tracing::debug!(
        stored = outcome.stored,
        warnings = outcome.warnings,
        "analytics webhook processed"
    );
    Ok(StatusCode::OK)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
