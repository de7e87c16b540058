#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use geoshare_common::{ClientEvent, ConnectionId, PositionReport, ServerEvent};
use geoshare_server::config::Config;
use geoshare_server::AppState;
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::{tungstenite, MaybeTlsStream, WebSocketStream};

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const TEST_TOKEN: &str = "pk.test-token";

/// Build a test AppState with the shipped template and a placeholder token.
pub fn test_state() -> AppState {
    test_state_with(Config::local(TEST_TOKEN))
}

pub fn test_state_with(config: Config) -> AppState {
    AppState::start(config).expect("load test template")
}

/// Build the full application router wired to the test state.
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    let app = geoshare_server::routes::router(&state.config.static_dir).with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background.
pub async fn start_ws_server() -> (SocketAddr, AppState) {
    start_ws_server_with(Config::local(TEST_TOKEN)).await
}

pub async fn start_ws_server_with(config: Config) -> (SocketAddr, AppState) {
    let state = test_state_with(config);
    let app = geoshare_server::routes::router(&state.config.static_dir).with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Connect to the gateway and read the `connected` greeting.
pub async fn connect(addr: SocketAddr) -> (Ws, ConnectionId) {
    let url = format!("ws://{addr}/ws");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");

    match next_event(&mut ws).await {
        ServerEvent::Connected(welcome) => (ws, welcome.id),
        other => panic!("Expected connected event, got: {other:?}"),
    }
}

/// Read the next server event, skipping control frames.
pub async fn next_event(ws: &mut Ws) -> ServerEvent {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for event")
            .expect("stream ended")
            .expect("ws read error");

        match msg {
            tungstenite::Message::Text(text) => {
                return serde_json::from_str(&text).expect("parse server event")
            }
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("Expected text frame, got: {other:?}"),
        }
    }
}

pub async fn send_report(ws: &mut Ws, lat: f64, lon: f64, accuracy: Option<f64>, name: &str) {
    let event = ClientEvent::SendLocation(PositionReport {
        latitude: lat,
        longitude: lon,
        accuracy,
        name: name.to_string(),
    });
    ws.send(tungstenite::Message::Text(
        serde_json::to_string(&event).unwrap().into(),
    ))
    .await
    .expect("send report");
}
