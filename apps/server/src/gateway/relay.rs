//! Broadcast relay: the single writer of presence state.
//!
//! Socket tasks never touch the registry. They push [`RelayCommand`]s onto one
//! FIFO queue consumed by a dedicated task, so each command (registry mutation
//! plus the broadcasts it triggers) completes before the next one starts.

use geoshare_common::wire::Welcome;
use geoshare_common::{ConnectionId, PositionBroadcast, PositionReport, RosterEntry, ServerEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::fanout::{Fanout, Outbound};
use super::presence::PresenceRegistry;

/// Presence registry plus the connection set it broadcasts to.
pub struct Relay {
    presence: PresenceRegistry,
    fanout: Fanout,
    strict_coordinates: bool,
}

impl Relay {
    pub fn new(strict_coordinates: bool) -> Self {
        Self {
            presence: PresenceRegistry::new(),
            fanout: Fanout::new(),
            strict_coordinates,
        }
    }

    /// Register a fresh connection and tell it its identity.
    ///
    /// Peers learn about it only once it reports a position.
    pub fn on_connect(&mut self, id: ConnectionId, outbound: Outbound) {
        self.fanout.register(id.clone(), outbound);
        self.fanout.send_to(&id, ServerEvent::Connected(Welcome { id: id.clone() }));
        tracing::debug!(connection_id = %id, connections = self.fanout.len(), "connection registered");
    }

    /// Record the reporter's name, then broadcast its position and the roster.
    ///
    /// Returns `false` if the report was rejected by the strict bounds check.
    pub fn on_position_report(&mut self, id: &ConnectionId, report: PositionReport) -> bool {
        if let Err(err) = report.validate() {
            if self.strict_coordinates {
                tracing::warn!(connection_id = %id, %err, "rejected position report");
                return false;
            }
            tracing::debug!(connection_id = %id, %err, "forwarding out-of-range position report");
        }

        if self.presence.upsert(id, &report.name) {
            tracing::info!(connection_id = %id, name = %report.name, "user joined roster");
        }

        let position = PositionBroadcast::from_report(id.clone(), &report);
        self.fanout.broadcast(ServerEvent::ReceiveLocation(position));
        self.broadcast_roster();
        true
    }

    /// Forget the connection, then broadcast the notice and the roster to the
    /// connections that remain. Unknown identities are fine.
    pub fn on_disconnect(&mut self, id: &ConnectionId) {
        self.fanout.unregister(id);
        if self.presence.remove(id) {
            tracing::info!(connection_id = %id, "user left roster");
        }

        self.fanout.broadcast(ServerEvent::UserDisconnected(id.clone()));
        self.broadcast_roster();
    }

    pub fn roster(&self) -> Vec<RosterEntry> {
        self.presence.snapshot()
    }

    /// The roster line for `id`, if it has reported.
    pub fn lookup(&self, id: &ConnectionId) -> Option<RosterEntry> {
        self.presence.get(id).map(|name| RosterEntry {
            id: id.clone(),
            name: name.to_string(),
        })
    }

    pub fn connection_count(&self) -> usize {
        self.fanout.len()
    }

    fn broadcast_roster(&self) {
        let reached = self.fanout.broadcast(ServerEvent::Roster(self.presence.snapshot()));
        tracing::trace!(reached, roster = self.presence.len(), "roster broadcast");
    }

    fn apply(&mut self, command: RelayCommand) {
        match command {
            RelayCommand::Connect { id, outbound } => self.on_connect(id, outbound),
            RelayCommand::Report { id, report } => {
                self.on_position_report(&id, report);
            }
            RelayCommand::Disconnect { id } => self.on_disconnect(&id),
            RelayCommand::Roster { reply } => {
                let _ = reply.send(self.roster());
            }
            RelayCommand::Lookup { id, reply } => {
                let _ = reply.send(self.lookup(&id));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Relay task
// ---------------------------------------------------------------------------

/// Work items processed by the relay task, strictly in arrival order.
#[derive(Debug)]
pub enum RelayCommand {
    Connect {
        id: ConnectionId,
        outbound: Outbound,
    },
    Report {
        id: ConnectionId,
        report: PositionReport,
    },
    Disconnect {
        id: ConnectionId,
    },
    Roster {
        reply: oneshot::Sender<Vec<RosterEntry>>,
    },
    Lookup {
        id: ConnectionId,
        reply: oneshot::Sender<Option<RosterEntry>>,
    },
}

/// Cloneable sender side of the relay task. Store in `AppState`.
#[derive(Clone)]
pub struct RelayHandle {
    commands: mpsc::UnboundedSender<RelayCommand>,
}

impl RelayHandle {
    pub fn connect(&self, id: ConnectionId, outbound: Outbound) {
        self.send(RelayCommand::Connect { id, outbound });
    }

    pub fn report(&self, id: ConnectionId, report: PositionReport) {
        self.send(RelayCommand::Report { id, report });
    }

    pub fn disconnect(&self, id: ConnectionId) {
        self.send(RelayCommand::Disconnect { id });
    }

    /// Snapshot of the roster. `None` if the relay task has stopped.
    pub async fn roster(&self) -> Option<Vec<RosterEntry>> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Roster { reply });
        rx.await.ok()
    }

    /// One roster line. The outer `None` means the relay task has stopped.
    pub async fn lookup(&self, id: ConnectionId) -> Option<Option<RosterEntry>> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Lookup { id, reply });
        rx.await.ok()
    }

    fn send(&self, command: RelayCommand) {
        if self.commands.send(command).is_err() {
            tracing::error!("relay task is not running");
        }
    }
}

/// Start the relay on its own task.
///
/// The task stops once every [`RelayHandle`] has been dropped.
pub fn spawn_relay(relay: Relay) -> (RelayHandle, JoinHandle<()>) {
    let (commands, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(relay, rx));
    (RelayHandle { commands }, task)
}

async fn run(mut relay: Relay, mut rx: mpsc::UnboundedReceiver<RelayCommand>) {
    tracing::info!("relay started");
    while let Some(command) = rx.recv().await {
        relay.apply(command);
    }
    tracing::info!(connections = relay.connection_count(), "relay stopped");
}
