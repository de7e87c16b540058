//! Close codes and frame encoding for the gateway socket.

use geoshare_common::{ClientEvent, ServerEvent};

// ---------------------------------------------------------------------------
// Close codes (4000-range for application-level)
// ---------------------------------------------------------------------------

pub const CLOSE_INVALID_PAYLOAD: u16 = 4000;
pub const CLOSE_SESSION_TIMEOUT: u16 = 4009;

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Parse an inbound text frame into a typed client event.
pub fn decode_client_frame(text: &str) -> Result<ClientEvent, serde_json::Error> {
    serde_json::from_str(text)
}

/// Serialize an outbound event as a text frame body.
pub fn encode_server_event(event: &ServerEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}
