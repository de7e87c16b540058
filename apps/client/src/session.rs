//! Channel session: joins the relay, streams the local position under the
//! chosen display name, and feeds every server event to the renderer.

use std::str::FromStr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use geoshare_common::{ClientEvent, ConnectionId, PositionReport, ServerEvent};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::error::ClientError;
use crate::location::{Fix, LocationError, LocationProvider, PositionWatch, WatchOptions};
use crate::prefs::{PreferenceStore, Preferences};
use crate::renderer::{MapBackend, MapRenderer};
use crate::roster::RosterItem;
use crate::style::{MapStyle, UnknownStyle};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// One joined connection to the relay.
pub struct Channel {
    ws: Socket,
    id: ConnectionId,
}

impl Channel {
    /// Open the socket and wait for the `connected` greeting.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (mut ws, _) = tokio_tungstenite::connect_async(url).await?;
        match read_event(&mut ws).await? {
            Some(ServerEvent::Connected(welcome)) => {
                info!(id = %welcome.id, url, "joined relay");
                Ok(Self { ws, id: welcome.id })
            }
            Some(other) => Err(ClientError::Protocol(format!(
                "expected `connected`, got `{}`",
                other.name()
            ))),
            None => Err(ClientError::Protocol("closed before greeting".into())),
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub async fn send_report(&mut self, report: PositionReport) -> Result<(), ClientError> {
        let frame = serde_json::to_string(&ClientEvent::SendLocation(report))?;
        self.ws.send(Message::Text(frame.into())).await?;
        Ok(())
    }

    /// Next server event. `None` once the server has closed the channel.
    pub async fn next_event(&mut self) -> Result<Option<ServerEvent>, ClientError> {
        read_event(&mut self.ws).await
    }

    pub async fn close(mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!(error = %e, "close handshake failed");
        }
    }
}

async fn read_event(ws: &mut Socket) -> Result<Option<ServerEvent>, ClientError> {
    while let Some(msg) = ws.next().await {
        match msg? {
            Message::Text(text) => match serde_json::from_str(text.as_str()) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => warn!(error = %e, "skipping undecodable frame"),
            },
            Message::Close(frame) => {
                debug!(?frame, "server closed channel");
                return Ok(None);
            }
            // Pongs are queued by tungstenite and flushed on the next read.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            Message::Binary(data) => warn!(len = data.len(), "skipping binary frame"),
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// User input driving a running [`Client`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetName(String),
    Focus(String),
    SetStyle(MapStyle),
    ShowRoster,
    Quit,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error(transparent)]
    Style(#[from] UnknownStyle),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        let arg = |name: &'static str| {
            if rest.is_empty() {
                Err(CommandError::MissingArgument(name))
            } else {
                Ok(rest.to_string())
            }
        };

        match head {
            "/name" => Ok(Command::SetName(arg("/name")?)),
            "/focus" => Ok(Command::Focus(arg("/focus")?)),
            "/style" => Ok(Command::SetStyle(arg("/style")?.parse()?)),
            "/roster" => Ok(Command::ShowRoster),
            "/quit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Things worth telling the user about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Joined(ConnectionId),
    NameRequired,
    Roster(Vec<RosterItem>),
    LocationFailed(LocationError),
    Focused { target: String, found: bool },
    StyleChanged(MapStyle),
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub url: String,
    pub watch: WatchOptions,
    pub reconnect_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Quit,
    Renamed,
    Disconnected,
}

pub struct Client<B: MapBackend, L: LocationProvider> {
    options: ClientOptions,
    renderer: MapRenderer<B>,
    location: L,
    store: PreferenceStore,
    prefs: Preferences,
    last_fix: Option<Fix>,
    notices: Option<mpsc::UnboundedSender<Notice>>,
}

impl<B: MapBackend, L: LocationProvider> Client<B, L> {
    pub fn new(
        options: ClientOptions,
        renderer: MapRenderer<B>,
        location: L,
        store: PreferenceStore,
        prefs: Preferences,
    ) -> Self {
        Self {
            options,
            renderer,
            location,
            store,
            prefs,
            last_fix: None,
            notices: None,
        }
    }

    pub fn with_notices(mut self, notices: mpsc::UnboundedSender<Notice>) -> Self {
        self.notices = Some(notices);
        self
    }

    pub fn renderer(&self) -> &MapRenderer<B> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut MapRenderer<B> {
        &mut self.renderer
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    /// Run until `/quit` or the command channel closes, reconnecting with a
    /// fresh identity whenever the channel drops or the name changes.
    pub async fn run(
        &mut self,
        commands: &mut mpsc::Receiver<Command>,
    ) -> Result<(), ClientError> {
        loop {
            let channel = tokio::select! {
                result = Channel::connect(&self.options.url) => result,
                cmd = commands.recv() => match cmd {
                    Some(Command::Quit) | None => return Ok(()),
                    Some(cmd) => {
                        self.handle_offline(cmd)?;
                        continue;
                    }
                },
            };

            let end = match channel {
                Ok(channel) => self.run_session(channel, commands).await,
                Err(e) => Err(e),
            };

            match end {
                Ok(SessionEnd::Quit) => return Ok(()),
                Ok(SessionEnd::Renamed) => continue,
                Ok(SessionEnd::Disconnected) => warn!("channel closed by server"),
                Err(e) if e.is_transient() => warn!(error = %e, "channel lost"),
                Err(e) => return Err(e),
            }

            tokio::select! {
                _ = time::sleep(self.options.reconnect_delay) => {}
                cmd = commands.recv() => match cmd {
                    Some(Command::Quit) | None => return Ok(()),
                    Some(cmd) => self.handle_offline(cmd)?,
                },
            }
        }
    }

    async fn run_session(
        &mut self,
        mut channel: Channel,
        commands: &mut mpsc::Receiver<Command>,
    ) -> Result<SessionEnd, ClientError> {
        self.renderer.reset();
        self.renderer.set_local_identity(channel.id().clone());
        self.notify(Notice::Joined(channel.id().clone()));

        let mut watch = None;
        if self.prefs.user_name.is_some() {
            watch = Some(self.start_tracking(&mut channel).await?);
        } else {
            self.notify(Notice::NameRequired);
        }

        loop {
            tokio::select! {
                event = channel.next_event() => match event? {
                    Some(event) => self.on_event(&event),
                    None => return Ok(SessionEnd::Disconnected),
                },
                fix = next_fix(&mut watch) => match fix {
                    Some(Ok(fix)) => {
                        self.last_fix = Some(fix);
                        self.report(&mut channel, fix).await?;
                    }
                    Some(Err(e)) => self.location_failed(e),
                    None => watch = None,
                },
                cmd = commands.recv() => match cmd {
                    Some(Command::Quit) | None => {
                        channel.close().await;
                        return Ok(SessionEnd::Quit);
                    }
                    Some(Command::SetName(name)) => {
                        let renamed = self.prefs.user_name.is_some();
                        self.set_name(name)?;
                        if renamed {
                            if let Some(w) = watch.take() {
                                w.cancel();
                            }
                            channel.close().await;
                            return Ok(SessionEnd::Renamed);
                        }
                        watch = Some(self.start_tracking(&mut channel).await?);
                    }
                    Some(cmd) => self.handle_offline(cmd)?,
                },
            }
        }
    }

    /// Report a position right away, then hand back the watch for the rest.
    ///
    /// A rejoin re-sends the last known fix. The first join asks the provider
    /// for a one-shot fix and centers the map on it.
    async fn start_tracking(
        &mut self,
        channel: &mut Channel,
    ) -> Result<PositionWatch, ClientError> {
        let fix = match self.last_fix {
            Some(fix) => Some(fix),
            None => {
                let timeout = self.options.watch.timeout;
                let one_shot = self.location.current_position(&self.options.watch);
                let outcome = time::timeout(timeout, one_shot).await;
                match outcome {
                    Ok(Ok(fix)) => {
                        self.last_fix = Some(fix);
                        self.renderer.center_on(fix.position());
                        Some(fix)
                    }
                    Ok(Err(e)) => {
                        self.location_failed(e);
                        None
                    }
                    Err(_) => {
                        self.location_failed(LocationError::Timeout(timeout));
                        None
                    }
                }
            }
        };
        if let Some(fix) = fix {
            self.report(channel, fix).await?;
        }
        Ok(self.location.watch_position(&self.options.watch))
    }

    fn location_failed(&self, e: LocationError) {
        error!(error = %e, "location unavailable");
        self.notify(Notice::LocationFailed(e));
    }

    fn on_event(&mut self, event: &ServerEvent) {
        debug!(event = event.name(), "server event");
        self.renderer.apply(event);
        if let ServerEvent::Roster(_) = event {
            self.notify(Notice::Roster(self.renderer.roster().items().to_vec()));
        }
    }

    async fn report(&mut self, channel: &mut Channel, fix: Fix) -> Result<(), ClientError> {
        let name = self.prefs.user_name.clone().ok_or(ClientError::MissingName)?;
        channel
            .send_report(PositionReport {
                latitude: fix.latitude,
                longitude: fix.longitude,
                accuracy: fix.accuracy,
                name,
            })
            .await
    }

    /// Commands that need no open channel.
    fn handle_offline(&mut self, cmd: Command) -> Result<(), ClientError> {
        match cmd {
            Command::SetName(name) => self.set_name(name)?,
            Command::Focus(target) => {
                let id = self.renderer.roster().find(&target).map(|item| item.id.clone());
                let found = id.is_some_and(|id| self.renderer.focus(&id));
                self.notify(Notice::Focused { target, found });
            }
            Command::SetStyle(style) => {
                self.renderer.set_style(style);
                self.prefs.map_style = Some(style);
                self.store.save(&self.prefs)?;
                self.notify(Notice::StyleChanged(style));
            }
            Command::ShowRoster => {
                self.notify(Notice::Roster(self.renderer.roster().items().to_vec()));
            }
            Command::Quit => {}
        }
        Ok(())
    }

    fn set_name(&mut self, name: String) -> Result<(), ClientError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ClientError::MissingName);
        }
        info!(name = %name, "display name set");
        self.prefs.user_name = Some(name);
        self.store.save(&self.prefs)
    }

    fn notify(&self, notice: Notice) {
        if let Some(tx) = &self.notices {
            let _ = tx.send(notice);
        }
    }
}

async fn next_fix(watch: &mut Option<PositionWatch>) -> Option<Result<Fix, LocationError>> {
    match watch {
        Some(watch) => watch.next().await,
        None => std::future::pending().await,
    }
}
