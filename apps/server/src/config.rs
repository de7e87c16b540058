use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Relay server configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind: IpAddr,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Mapping-provider access token injected into the rendered page.
    pub mapbox_token: String,
    /// Directory served as static client assets.
    pub static_dir: PathBuf,
    /// Directory holding `index.html`.
    pub template_dir: PathBuf,
    /// Interval between keepalive pings on each connection.
    pub ping_interval: Duration,
    /// Per-connection outbound queue depth before events are dropped.
    pub outbound_buffer: usize,
    /// Reject out-of-range position reports instead of forwarding them as-is.
    pub strict_coordinates: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            bind: parsed_var("GEOSHARE_BIND").unwrap_or(IpAddr::from([0, 0, 0, 0])),
            port: parsed_var("PORT").unwrap_or(3000),
            mapbox_token: required_var("MAPBOX_TOKEN"),
            static_dir: std::env::var("GEOSHARE_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("public")),
            template_dir: std::env::var("GEOSHARE_TEMPLATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("templates")),
            ping_interval: Duration::from_secs(
                parsed_var("GEOSHARE_PING_INTERVAL_SECS").unwrap_or(25),
            ),
            outbound_buffer: parsed_var("GEOSHARE_OUTBOUND_BUFFER")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(256),
            strict_coordinates: parsed_var("GEOSHARE_STRICT_COORDINATES").unwrap_or(false),
        }
    }

    /// Defaults suitable for tests and local runs, with a placeholder token.
    pub fn local(mapbox_token: impl Into<String>) -> Self {
        let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        Self {
            bind: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            mapbox_token: mapbox_token.into(),
            static_dir: manifest.join("public"),
            template_dir: manifest.join("templates"),
            ping_interval: Duration::from_secs(25),
            outbound_buffer: 256,
            strict_coordinates: false,
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
