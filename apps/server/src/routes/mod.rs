pub mod health;
pub mod page;
pub mod roster;

use std::path::Path;

use axum::Router;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::AppState;

/// All HTTP and WebSocket routes. Anything unmatched is looked up in
/// `static_dir`.
pub fn router(static_dir: &Path) -> Router<AppState> {
    Router::new()
        .merge(page::router())
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest("/api/v1", roster::router())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback_service(ServeDir::new(static_dir))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        roster::list_roster,
        roster::get_roster_entry,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            health::HealthResponse,
            roster::RosterEntryResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Roster", description = "Currently connected users"),
    )
)]
pub struct ApiDoc;
