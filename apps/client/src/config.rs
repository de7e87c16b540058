use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::location::WatchOptions;
use crate::session::ClientOptions;
use crate::style::MapStyle;

/// Terminal client configuration: flags with environment fallbacks.
#[derive(Parser, Debug, Clone)]
#[command(name = "geoshare-client")]
#[command(about = "Share a (simulated) position with a geoshare relay and follow everyone else")]
pub struct Config {
    /// Relay WebSocket URL
    #[arg(long, env = "GEOSHARE_URL", default_value = "ws://127.0.0.1:3000/ws")]
    pub url: String,

    /// Preferences file (display name and map style)
    #[arg(long, env = "GEOSHARE_PREFS", default_value = "geoshare-prefs.json")]
    pub prefs: PathBuf,

    /// Milliseconds a position watch may stay silent before reporting a timeout
    #[arg(long, env = "GEOSHARE_LOCATION_TIMEOUT_MS", default_value_t = 5000)]
    pub location_timeout_ms: u64,

    /// Display name; overrides the stored one
    #[arg(long)]
    pub name: Option<String>,

    /// Map style; overrides the stored one
    #[arg(long)]
    pub style: Option<MapStyle>,

    /// Starting latitude of the simulated walk
    #[arg(long, default_value_t = 51.5074, allow_negative_numbers = true)]
    pub lat: f64,

    /// Starting longitude of the simulated walk
    #[arg(long, default_value_t = -0.1278, allow_negative_numbers = true)]
    pub lon: f64,

    /// Meters moved per simulated fix
    #[arg(long, default_value_t = 10.0)]
    pub step_meters: f64,

    /// Milliseconds between simulated fixes
    #[arg(long, default_value_t = 2000)]
    pub interval_ms: u64,

    /// Accuracy radius reported with simulated fixes, in meters
    #[arg(long, default_value_t = 20.0)]
    pub accuracy: f64,

    /// Milliseconds to wait before reconnecting
    #[arg(long, default_value_t = 1000)]
    pub reconnect_delay_ms: u64,
}

impl Config {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            url: self.url.clone(),
            watch: WatchOptions {
                timeout: Duration::from_millis(self.location_timeout_ms),
                ..WatchOptions::default()
            },
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }

    pub fn fix_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::try_parse_from(["geoshare-client"]).unwrap();
        let options = config.client_options();
        assert_eq!(options.watch.timeout, Duration::from_millis(5000));
        assert!(options.watch.high_accuracy);
        assert_eq!(config.step_meters, 10.0);
        assert!(config.style.is_none());
    }

    #[test]
    fn style_and_name_flags_parse() {
        let config = Config::try_parse_from([
            "geoshare-client",
            "--name",
            "Amy",
            "--style",
            "satellite-streets-v12",
            "--lat",
            "-33.86",
        ])
        .unwrap();
        assert_eq!(config.name.as_deref(), Some("Amy"));
        assert_eq!(config.style, Some(MapStyle::SatelliteStreets));
        assert_eq!(config.lat, -33.86);
        assert!(Config::try_parse_from(["geoshare-client", "--style", "neon"]).is_err());
    }
}
