//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use geoshare_common::{ClientEvent, ServerEvent};
use tokio::sync::mpsc;
use tokio::time;

use crate::AppState;

use super::events::{
    decode_client_frame, encode_server_event, CLOSE_INVALID_PAYLOAD, CLOSE_SESSION_TIMEOUT,
};
use super::session::GatewaySession;

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (ws_tx, ws_rx) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(state.config.outbound_buffer);

    let mut session = GatewaySession::open(state.relay.clone(), outbound_tx);
    tracing::info!(connection_id = %session.id(), "gateway connection established");

    let reason = run_session(
        &mut session,
        ws_tx,
        ws_rx,
        outbound_rx,
        state.config.ping_interval,
    )
    .await;

    tracing::info!(
        connection_id = %session.id(),
        reports = session.reports(),
        reason,
        "gateway connection ended"
    );
    // Dropping the session queues the disconnect behind every forwarded report.
}

/// Main session loop: forward client reports to the relay, relay events to the
/// client, and close connections that stop answering pings.
///
/// Returns a short reason for the log line.
async fn run_session(
    session: &mut GatewaySession,
    mut ws_tx: WsSink,
    mut ws_rx: WsStream,
    mut outbound_rx: mpsc::Receiver<Arc<ServerEvent>>,
    ping_interval: Duration,
) -> &'static str {
    let mut ping_timer = time::interval(ping_interval);
    ping_timer.tick().await; // First tick fires immediately; skip it.
    let mut heard_from_client = true;

    loop {
        tokio::select! {
            // Client sends us a frame.
            msg = ws_rx.next() => {
                heard_from_client = true;
                match msg {
                    Some(Ok(Message::Text(text))) => match decode_client_frame(text.as_str()) {
                        Ok(ClientEvent::SendLocation(report)) => session.report(report),
                        Err(err) => {
                            tracing::debug!(connection_id = %session.id(), %err, "invalid client frame");
                            let _ = send_close(&mut ws_tx, CLOSE_INVALID_PAYLOAD, "Invalid payload").await;
                            return "invalid payload";
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => return "client closed",
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %session.id(), "ws read error");
                        return "read error";
                    }
                }
            }

            // Event queued for us by the relay.
            event = outbound_rx.recv() => {
                let Some(event) = event else {
                    return "relay stopped";
                };
                let json = match encode_server_event(&event) {
                    Ok(json) => json,
                    Err(err) => {
                        tracing::error!(%err, event = event.name(), "failed to encode event");
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                    return "write error";
                }
            }

            // Keepalive: the client must have said something since the last tick.
            _ = ping_timer.tick() => {
                if !heard_from_client {
                    tracing::debug!(
                        connection_id = %session.id(),
                        "keepalive timeout, closing connection"
                    );
                    let _ = send_close(&mut ws_tx, CLOSE_SESSION_TIMEOUT, "Keepalive timeout").await;
                    return "keepalive timeout";
                }
                heard_from_client = false;
                if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    return "write error";
                }
            }
        }
    }
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(ws_tx: &mut WsSink, code: u16, reason: &str) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
