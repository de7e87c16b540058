use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` while the relay answers, `degraded` once it has stopped.
    pub status: String,
    /// Users currently in the roster.
    pub online: usize,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Liveness and roster size", body = HealthResponse)),
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, online) = match state.relay.roster().await {
        Some(roster) => ("ok", roster.len()),
        None => ("degraded", 0),
    };
    Json(HealthResponse {
        status: status.to_string(),
        online,
    })
}
