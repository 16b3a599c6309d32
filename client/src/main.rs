use clap::Parser;
use client::input::spawn_stdin_reader;
use client::network::{Client, ClientConfig};
use client::rendering::LogRenderer;
use client::rpc::RetryPolicy;
use log::info;
use shared::map::GameMap;
use shared::{DEFAULT_SERVER_ADDR, MAX_ATTEMPTS};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = DEFAULT_SERVER_ADDR)]
    server: String,

    /// Map file; the built-in room is used when omitted
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Reconcile period in milliseconds
    #[arg(long, default_value = "100")]
    interval_ms: u64,

    /// Attempts per remote call
    #[arg(long, default_value_t = MAX_ATTEMPTS)]
    attempts: u32,

    /// Delay between attempts in milliseconds
    #[arg(long, default_value = "500")]
    backoff_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info to see the map and player positions");
    }

    let args = Args::parse();

    let map = match &args.map {
        Some(path) => GameMap::load(path)?,
        None => GameMap::default(),
    };
    info!("Map is {}x{}, spawn at {}", map.width(), map.height(), map.spawn());

    let config = ClientConfig {
        server_addr: args.server,
        map: Arc::new(map),
        reconcile_interval: Duration::from_millis(args.interval_ms),
        retry: RetryPolicy::new(args.attempts, Duration::from_millis(args.backoff_ms)),
    };

    let client = Client::connect(config, Box::new(LogRenderer::new())).await?;

    let (actions_tx, actions_rx) = mpsc::channel(32);
    spawn_stdin_reader(actions_tx)?;

    tokio::select! {
        result = client.run(actions_rx) => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down gracefully..."),
    }

    client.shutdown().await?;

    // The stdin thread may still be blocked on a read; it ends with the process.
    Ok(())
}
