pub mod geo;
pub mod id;
pub mod wire;

pub use geo::{accuracy_feature, accuracy_polygon, LngLat};
pub use id::ConnectionId;
pub use wire::{ClientEvent, PositionBroadcast, PositionReport, RosterEntry, ServerEvent};
