//! Channel event schema shared by the relay server and its clients.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::LngLat;
use crate::id::ConnectionId;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Event names used on the channel.
pub struct EventName;

impl EventName {
    pub const CONNECTED: &'static str = "connected";
    pub const SEND_LOCATION: &'static str = "send-location";
    pub const RECEIVE_LOCATION: &'static str = "receive-location";
    pub const ROSTER: &'static str = "roster";
    pub const USER_DISCONNECTED: &'static str = "user-disconnected";
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// A position sample reported by a client under its display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    pub latitude: f64,
    pub longitude: f64,
    /// Accuracy radius in meters, when the device reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub name: String,
}

/// Why a position report failed the bounds check.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReportError {
    #[error("latitude {0} outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} outside [-180, 180]")]
    Longitude(f64),
    #[error("accuracy {0} is negative")]
    Accuracy(f64),
    #[error("display name is empty")]
    EmptyName,
}

impl PositionReport {
    pub fn position(&self) -> LngLat {
        LngLat::new(self.longitude, self.latitude)
    }

    /// Range sanity check. The relay only enforces it in strict mode.
    pub fn validate(&self) -> Result<(), ReportError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ReportError::Latitude(self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ReportError::Longitude(self.longitude));
        }
        if let Some(acc) = self.accuracy {
            if acc < 0.0 {
                return Err(ReportError::Accuracy(acc));
            }
        }
        if self.name.trim().is_empty() {
            return Err(ReportError::EmptyName);
        }
        Ok(())
    }
}

/// Frames a client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "send-location")]
    SendLocation(PositionReport),
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Sent once per connection, carrying the identity the server assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Welcome {
    pub id: ConnectionId,
}

/// A position report enriched with the sender's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionBroadcast {
    pub id: ConnectionId,
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl PositionBroadcast {
    pub fn from_report(id: ConnectionId, report: &PositionReport) -> Self {
        Self {
            id,
            latitude: report.latitude,
            longitude: report.longitude,
            name: report.name.clone(),
            accuracy: report.accuracy,
        }
    }

    pub fn position(&self) -> LngLat {
        LngLat::new(self.longitude, self.latitude)
    }
}

/// One line of the "who is online" roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: ConnectionId,
    pub name: String,
}

/// Frames the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "connected")]
    Connected(Welcome),
    #[serde(rename = "receive-location")]
    ReceiveLocation(PositionBroadcast),
    #[serde(rename = "roster")]
    Roster(Vec<RosterEntry>),
    #[serde(rename = "user-disconnected")]
    UserDisconnected(ConnectionId),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => EventName::CONNECTED,
            Self::ReceiveLocation(_) => EventName::RECEIVE_LOCATION,
            Self::Roster(_) => EventName::ROSTER,
            Self::UserDisconnected(_) => EventName::USER_DISCONNECTED,
        }
    }
}
