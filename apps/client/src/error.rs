use thiserror::Error;

use crate::location::LocationError;

/// Errors surfaced by the client session.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("channel transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("preferences i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error("no display name set")]
    MissingName,
}

impl ClientError {
    /// Whether reconnecting could help.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Protocol(_))
    }
}
