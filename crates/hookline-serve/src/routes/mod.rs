//! API route definitions.

mod aliases;
mod events;
mod health;
mod webhooks;

use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;

use crate::auth::require_auth;
use crate::state::AppState;

/// Build the complete API router.
///
/// # Route Structure
///
/// ## Public (no auth)
/// - `GET /health` - Health check
///
/// ## Signature-authenticated ingest
/// - `POST /heroku/webhooks` - Platform source (HMAC-SHA256, base64 header)
/// - `POST /segment/webhooks` - Analytics source (HMAC-SHA1, hex header),
///   single event or `_json` batch
///
/// ## Token-protected inspection
/// - `GET /events` - Stored event payloads in insertion order
/// - `GET /invalid_user_ids` - Unreconciled suspect identifiers
/// - `PUT /invalid_user_ids/{value}` - Record a canonical alias
pub fn router(state: AppState) -> Router {
    // Webhook ingest authenticates per request via HMAC signatures, and the
    // health probe is open.
    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/heroku/webhooks", post(webhooks::platform))
        .route("/segment/webhooks", post(webhooks::analytics));

    let protected = Router::new()
        .route("/events", get(events::list_events))
        .route("/invalid_user_ids", get(aliases::list_unreconciled))
        .route("/invalid_user_ids/{value}", put(aliases::set_alias))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state)
}
