#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, SinkExt, StreamExt};
use geoshare_client::location::{Fix, LocationError, ManualLocation, PositionWatch, WatchOptions};
use geoshare_client::prefs::{PreferenceStore, Preferences};
use geoshare_client::{
    Client, ClientError, ClientOptions, Command, HeadlessMap, LocationProvider, MapRenderer,
    MapStyle, Notice,
};
use geoshare_common::wire::Welcome;
use geoshare_common::{ClientEvent, ConnectionId, PositionReport, ServerEvent};
use geoshare_server::config::Config;
use geoshare_server::AppState;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_tungstenite::{tungstenite, MaybeTlsStream, WebSocketStream};

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type TestClient<L = ManualLocation> = Client<HeadlessMap, L>;

/// Start a relay server on an ephemeral port.
pub async fn start_relay() -> (SocketAddr, AppState) {
    let state = AppState::start(Config::local("pk.test-token")).expect("load test template");
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

pub fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{addr}/ws")
}

/// A running client plus the handles a test drives it with.
pub struct Running<L: LocationProvider = ManualLocation> {
    pub commands: mpsc::Sender<Command>,
    pub notices: mpsc::UnboundedReceiver<Notice>,
    pub task: JoinHandle<(TestClient<L>, Result<(), ClientError>)>,
}

impl<L: LocationProvider> Running<L> {
    /// Quit and hand the client back for inspection.
    pub async fn quit(self) -> TestClient<L> {
        self.commands.send(Command::Quit).await.expect("client alive");
        let (client, result) = time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("client did not stop")
            .expect("client task panicked");
        result.expect("client run failed");
        client
    }

    /// Wait for the first notice matching `pred`.
    pub async fn wait_for(&mut self, mut pred: impl FnMut(&Notice) -> bool) -> Notice {
        time::timeout(Duration::from_secs(5), async {
            loop {
                let notice = self.notices.recv().await.expect("client gone");
                if pred(&notice) {
                    return notice;
                }
            }
        })
        .await
        .expect("timeout waiting for notice")
    }

    /// Wait for a roster notice whose names are exactly `names`, in order.
    pub async fn wait_for_roster(&mut self, names: &[&str]) -> Notice {
        self.wait_for(|notice| match notice {
            Notice::Roster(items) => {
                items.iter().map(|i| i.name.as_str()).eq(names.iter().copied())
            }
            _ => false,
        })
        .await
    }
}

pub fn spawn_client<L: LocationProvider + 'static>(
    addr: SocketAddr,
    location: L,
    prefs_path: &Path,
    prefs: Preferences,
) -> Running<L> {
    let (notice_tx, notices) = mpsc::unbounded_channel();
    let (commands, mut command_rx) = mpsc::channel(16);

    let options = ClientOptions {
        url: ws_url(addr),
        watch: WatchOptions {
            timeout: Duration::from_secs(30),
            ..WatchOptions::default()
        },
        reconnect_delay: Duration::from_millis(50),
    };
    let renderer = MapRenderer::new(HeadlessMap::auto_loading(), MapStyle::default());
    let store = PreferenceStore::new(prefs_path);
    let mut client = Client::new(options, renderer, location, store, prefs)
        .with_notices(notice_tx);

    let task = tokio::spawn(async move {
        let result = client.run(&mut command_rx).await;
        (client, result)
    });

    Running {
        commands,
        notices,
        task,
    }
}

pub fn named(name: &str) -> Preferences {
    Preferences {
        user_name: Some(name.to_string()),
        map_style: None,
    }
}

pub fn fix(lat: f64, lon: f64, accuracy: Option<f64>) -> Fix {
    Fix::new(lat, lon, accuracy)
}

// ---------------------------------------------------------------------------
// Raw peer
// ---------------------------------------------------------------------------

pub async fn connect_peer(addr: SocketAddr) -> (Ws, ConnectionId) {
    let (mut ws, _) = tokio_tungstenite::connect_async(ws_url(addr))
        .await
        .expect("ws connect");
    match next_event(&mut ws).await {
        ServerEvent::Connected(welcome) => (ws, welcome.id),
        other => panic!("Expected connected event, got: {other:?}"),
    }
}

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


// ---------------------------------------------------------------------------
// One-shot location
// ---------------------------------------------------------------------------

/// Answers one-shot queries from a queue (the last entry repeats) and hands
/// out watches that never yield.
#[derive(Clone)]
pub struct OneShotLocation {
    fixes: Arc<Mutex<VecDeque<Fix>>>,
}

impl OneShotLocation {
    pub fn new(fixes: impl IntoIterator<Item = Fix>) -> Self {
        Self {
            fixes: Arc::new(Mutex::new(fixes.into_iter().collect())),
        }
    }
}

#[async_trait]
impl LocationProvider for OneShotLocation {
    async fn current_position(&self, _options: &WatchOptions) -> Result<Fix, LocationError> {
        let mut fixes = self.fixes.lock();
        let fix = match fixes.len() {
            0 => return Err(LocationError::Unavailable("no fix queued".into())),
            1 => fixes[0],
            _ => fixes.pop_front().expect("non-empty queue"),
        };
        Ok(fix)
    }

    fn watch_position(&self, options: &WatchOptions) -> PositionWatch {
        PositionWatch::new(stream::pending(), options.timeout)
    }
}

// ---------------------------------------------------------------------------
// Scripted relay
// ---------------------------------------------------------------------------

pub type ServerWs = WebSocketStream<TcpStream>;

/// A bare WebSocket listener the test drives frame by frame.
pub struct ScriptedRelay {
    listener: TcpListener,
}

impl ScriptedRelay {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        Self { listener }
    }

    pub fn addr(&self) -> SocketAddr {
        self.listener.local_addr().unwrap()
    }

    /// Accept the next client and greet it with a fresh identity.
    pub async fn accept(&self) -> (ServerWs, ConnectionId) {
        let (stream, _) = time::timeout(Duration::from_secs(5), self.listener.accept())
            .await
            .expect("timeout waiting for client")
            .expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("ws handshake");
        let id = ConnectionId::generate();
        send_event(&mut ws, &ServerEvent::Connected(Welcome { id: id.clone() })).await;
        (ws, id)
    }
}

pub async fn send_event(ws: &mut ServerWs, event: &ServerEvent) {
    let text = serde_json::to_string(event).unwrap();
    send_raw(ws, tungstenite::Message::Text(text.into())).await;
}

pub async fn send_raw(ws: &mut ServerWs, msg: tungstenite::Message) {
    ws.send(msg).await.expect("send frame");
}

/// Next position report the client sent.
pub async fn next_report(ws: &mut ServerWs) -> PositionReport {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for report")
            .expect("stream ended")
            .expect("ws read error");
        match msg {
            tungstenite::Message::Text(text) => {
                let ClientEvent::SendLocation(report) =
                    serde_json::from_str(&text).expect("parse client event");
                return report;
            }
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("Expected text frame, got: {other:?}"),
        }
    }
}
