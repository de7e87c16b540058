use std::net::SocketAddr;
use std::path::Path;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use geoshare_server::config::Config;
use geoshare_server::AppState;

#[tokio::main]
async fn main() {
    // .env is optional; variables may come from the environment.
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let addr = SocketAddr::new(config.bind, config.port);

    tracing::info!(
        static_dir = %config.static_dir.display(),
        strict_coordinates = config.strict_coordinates,
        ping_interval_secs = config.ping_interval.as_secs(),
        "geoshare-server configured"
    );

    let static_dir = config.static_dir.clone();
    let state = AppState::start(config).expect("failed to load page template");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = geoshare_server::routes::router(&static_dir)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!(%addr, "geoshare-server listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("geoshare-server stopped");
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
