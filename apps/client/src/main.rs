use std::path::Path;

use clap::Parser;
use geoshare_common::LngLat;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use geoshare_client::config::Config;
use geoshare_client::location::SimulatedLocation;
use geoshare_client::prefs::PreferenceStore;
use geoshare_client::{Client, Command, HeadlessMap, MapRenderer, Notice};

#[tokio::main]
async fn main() {
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    // stdout belongs to the roster display.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::parse();
    let store = PreferenceStore::new(&config.prefs);
    let mut prefs = match store.load() {
        Ok(prefs) => prefs,
        Err(err) => {
            tracing::warn!(%err, path = %config.prefs.display(), "ignoring unreadable preferences");
            Default::default()
        }
    };
    if let Some(name) = &config.name {
        prefs.user_name = Some(name.clone());
    }
    if let Some(style) = config.style {
        prefs.map_style = Some(style);
    }

    let style = prefs.map_style.unwrap_or_default();
    let renderer = MapRenderer::new(HeadlessMap::auto_loading(), style);
    let location = SimulatedLocation::new(
        LngLat::new(config.lon, config.lat),
        config.step_meters,
        config.fix_interval(),
        config.accuracy,
    );

    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let (command_tx, mut command_rx) = mpsc::channel(16);

    let mut client = Client::new(config.client_options(), renderer, location, store, prefs)
        .with_notices(notice_tx);

    tokio::spawn(print_notices(notice_rx));
    tokio::spawn(read_commands(command_tx.clone()));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = command_tx.send(Command::Quit).await;
        }
    });

    tracing::info!(url = %config.url, "geoshare-client starting");
    if let Err(err) = client.run(&mut command_rx).await {
        tracing::error!(%err, "client stopped");
        std::process::exit(1);
    }
}

async fn read_commands(tx: mpsc::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(err) => {
                tracing::error!(%err, "stdin read failed");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(cmd) => {
                if tx.send(cmd).await.is_err() {
                    return;
                }
            }
            Err(err) => eprintln!("{err} (try /name, /focus, /style, /roster, /quit)"),
        }
    }
}

async fn print_notices(mut rx: mpsc::UnboundedReceiver<Notice>) {
    while let Some(notice) = rx.recv().await {
        match notice {
            Notice::Joined(id) => println!("joined as {id}"),
            Notice::NameRequired => println!("enter a display name with /name <name>"),
            Notice::Roster(items) => {
                println!("online ({}):", items.len());
                for item in items {
                    println!("  {item}");
                }
            }
            Notice::LocationFailed(err) => eprintln!("location error: {err}"),
            Notice::Focused { target, found: true } => println!("centered on {target}"),
            Notice::Focused { target, found: false } => println!("no known position for {target}"),
            Notice::StyleChanged(style) => println!("map style: {style}"),
        }
    }
}
