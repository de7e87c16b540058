use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// JSON error envelope: `{"error": {"code": .., "message": ..}}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorDetail {
    /// Stable machine-readable code, e.g. `NOT_FOUND`.
    pub code: String,
    pub message: String,
}

/// Failures of the read-only HTTP API.
#[derive(Debug)]
pub enum ApiError {
    /// The identity has no presence entry (never reported, or gone).
    NotInRoster(String),
    /// The relay task has stopped and cannot answer queries.
    RelayUnavailable,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotInRoster(_) => StatusCode::NOT_FOUND,
            ApiError::RelayUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotInRoster(_) => "NOT_FOUND",
            ApiError::RelayUnavailable => "UNAVAILABLE",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::NotInRoster(id) => format!("Connection {id} is not in the roster"),
            ApiError::RelayUnavailable => "Relay is not running".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::RelayUnavailable = self {
            tracing::error!("roster query failed: relay task is gone");
        }
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code().to_string(),
                message: self.message(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}
