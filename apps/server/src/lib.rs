pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use config::Config;
use gateway::relay::{spawn_relay, Relay, RelayHandle};
use routes::page::IndexPage;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub relay: RelayHandle,
    pub index: Arc<IndexPage>,
}

impl AppState {
    /// Render the page and start the relay task.
    ///
    /// Must be called inside a Tokio runtime. The relay stops once the last
    /// clone of the returned state is dropped.
    pub fn start(config: Config) -> std::io::Result<Self> {
        let index = IndexPage::load(&config.template_dir, &config.mapbox_token)?;
        let (relay, _task) = spawn_relay(Relay::new(config.strict_coordinates));
        Ok(Self {
            config: Arc::new(config),
            relay,
            index: Arc::new(index),
        })
    }
}
