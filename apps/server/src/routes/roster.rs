//! Read-only view of the presence roster.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use geoshare_common::{ConnectionId, RosterEntry};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiErrorBody};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/roster", get(list_roster))
        .route("/roster/{connection_id}", get(get_roster_entry))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RosterEntryResponse {
    /// Connection identity (`conn_` prefixed).
    pub id: String,
    /// Display name from the most recent position report.
    pub name: String,
}

impl From<RosterEntry> for RosterEntryResponse {
    fn from(entry: RosterEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            name: entry.name,
        }
    }
}

async fn current_roster(state: &AppState) -> Result<Vec<RosterEntry>, ApiError> {
    state
        .relay
        .roster()
        .await
        .ok_or(ApiError::RelayUnavailable)
}

// ---------------------------------------------------------------------------
// GET /api/v1/roster
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/roster",
    tag = "Roster",
    responses(
        (status = 200, description = "Connected users in roster order", body = Vec<RosterEntryResponse>),
        (status = 503, description = "Relay not running", body = ApiErrorBody),
    ),
)]
pub async fn list_roster(
    State(state): State<AppState>,
) -> Result<Json<Vec<RosterEntryResponse>>, ApiError> {
    let roster = current_roster(&state).await?;
    Ok(Json(roster.into_iter().map(Into::into).collect()))
}

// ---------------------------------------------------------------------------
// GET /api/v1/roster/:connection_id
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/roster/{connection_id}",
    tag = "Roster",
    params(("connection_id" = String, Path, description = "Connection identity")),
    responses(
        (status = 200, description = "Roster entry", body = RosterEntryResponse),
        (status = 404, description = "Not in roster", body = ApiErrorBody),
        (status = 503, description = "Relay not running", body = ApiErrorBody),
    ),
)]
pub async fn get_roster_entry(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
) -> Result<Json<RosterEntryResponse>, ApiError> {
    state
        .relay
        .lookup(ConnectionId::from(connection_id.as_str()))
        .await
        .ok_or(ApiError::RelayUnavailable)?
        .map(|entry| Json(entry.into()))
        .ok_or(ApiError::NotInRoster(connection_id))
}
