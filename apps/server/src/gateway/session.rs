//! Per-connection gateway session state.

use geoshare_common::{ConnectionId, PositionReport};

use super::fanout::Outbound;
use super::relay::RelayHandle;

/// State for a single WebSocket connection.
///
/// Registers with the relay on open and always sends the disconnect command
/// on drop, after any report this session forwarded.
pub struct GatewaySession {
    /// Server-assigned identity (`conn_` prefixed ULID).
    id: ConnectionId,
    relay: RelayHandle,
    /// Number of position reports forwarded so far.
    reports: u64,
}

impl GatewaySession {
    pub fn open(relay: RelayHandle, outbound: Outbound) -> Self {
        let id = ConnectionId::generate();
        relay.connect(id.clone(), outbound);
        Self {
            id,
            relay,
            reports: 0,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn reports(&self) -> u64 {
        self.reports
    }

    /// Forward a position report to the relay.
    pub fn report(&mut self, report: PositionReport) {
        self.reports += 1;
        self.relay.report(self.id.clone(), report);
    }
}

impl Drop for GatewaySession {
    fn drop(&mut self) {
        self.relay.disconnect(self.id.clone());
    }
}
