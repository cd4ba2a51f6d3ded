//! Stored-event inspection endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

/// One stored event, payload only.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub payload: Value,
}

/// `GET /events`
///
/// Returns the retained event payloads in insertion order (oldest first).
pub async fn list_events(
    State(state): State<AppState>,
) -> Result<Json<Vec<EventRecord>>, ApiError> {
    let payloads = state.events().list()?;
    Ok(Json(
        payloads
            .into_iter()
            .map(|payload| EventRecord { payload })
            .collect(),
    ))
}
