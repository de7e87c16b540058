pub mod config;
pub mod error;
pub mod headless;
pub mod location;
pub mod prefs;
pub mod renderer;
pub mod roster;
pub mod session;
pub mod style;

pub use error::ClientError;
pub use headless::HeadlessMap;
pub use location::{
    Fix, LocationError, LocationProvider, PositionWatch, WatchCanceller, WatchOptions,
};
pub use renderer::{MapBackend, MapRenderer};
pub use session::{Client, ClientOptions, Command, Notice};
pub use style::MapStyle;
