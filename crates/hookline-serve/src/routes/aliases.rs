//! Suspect-identifier reconciliation endpoints.
//!
//! Operators map a known-bad fake-guid value to the canonical identifier it
//! belongs to; once mapped, repeat sightings of the value stop alerting.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::AliasEntry;

/// Body of a reconciliation request.
#[derive(Debug, Clone, Deserialize)]
pub struct SetAliasRequest {
    /// Canonical identifier the suspect value belongs to.
    pub aliased_to: String,
}

/// `PUT /invalid_user_ids/{value}`
///
/// Records the canonical identifier for a previously-observed suspect
/// value. 200 with empty body on success, 404 when the value was never
/// observed.
pub async fn set_alias(
    State(state): State<AppState>,
    Path(value): Path<String>,
    Json(request): Json<SetAliasRequest>,
) -> Result<StatusCode, ApiError> {
    let updated = state.aliases().set_alias(&value, &request.aliased_to)?;
    if !updated {
        return Err(ApiError::NotFound(format!(
            "invalid user id '{value}' has not been observed"
        )));
    }
    tracing::info!(value = %value, aliased_to = %request.aliased_to, "suspect identifier reconciled");
    Ok(StatusCode::OK)
}

/// `GET /invalid_user_ids`
///
/// Lists the suspect identifiers with no canonical mapping yet.
pub async fn list_unreconciled(
    State(state): State<AppState>,
) -> Result<Json<Vec<AliasEntry>>, ApiError> {
    Ok(Json(state.aliases().unreconciled()?))
}
