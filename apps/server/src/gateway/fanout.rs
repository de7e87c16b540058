//! Explicit fan-out to the set of currently registered connections.
//!
//! Each connection owns a bounded queue drained by its socket task. A full
//! queue drops that one event for that one connection; the relay never waits
//! on a slow receiver.

use std::collections::HashMap;
use std::sync::Arc;

use geoshare_common::{ConnectionId, ServerEvent};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Outbound half handed to the relay for one connection.
pub type Outbound = mpsc::Sender<Arc<ServerEvent>>;

/// The set of connections that broadcasts reach.
pub struct Fanout {
    connections: HashMap<ConnectionId, Outbound>,
}

impl Fanout {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    pub fn register(&mut self, id: ConnectionId, outbound: Outbound) {
        self.connections.insert(id, outbound);
    }

    /// Returns `true` if the connection was registered.
    pub fn unregister(&mut self, id: &ConnectionId) -> bool {
        self.connections.remove(id).is_some()
    }

    #[cfg(test)]
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Queue an event for a single connection.
    pub fn send_to(&self, id: &ConnectionId, event: ServerEvent) -> bool {
        match self.connections.get(id) {
            Some(outbound) => deliver(id, outbound, Arc::new(event)),
            None => false,
        }
    }

    /// Queue an event for every registered connection.
    ///
    /// Returns how many connections accepted it.
    pub fn broadcast(&self, event: ServerEvent) -> usize {
        let event = Arc::new(event);
        self.connections
            .iter()
            .filter(|(id, outbound)| deliver(id, outbound, event.clone()))
            .count()
    }
}

impl Default for Fanout {
    fn default() -> Self {
        Self::new()
    }
}

fn deliver(id: &ConnectionId, outbound: &Outbound, event: Arc<ServerEvent>) -> bool {
    match outbound.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(event)) => {
            tracing::warn!(
                connection_id = %id,
                event = event.name(),
                "outbound queue full, dropping event"
            );
            false
        }
        Err(TrySendError::Closed(_)) => {
            // Socket task already gone; its disconnect command is on the way.
            tracing::debug!(connection_id = %id, "outbound queue closed");
            false
        }
    }
}
