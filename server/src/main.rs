use clap::Parser;
use log::{error, info};
use server::network::Server;
use server::service::GameService;
use server::world::World;
use shared::map::GameMap;
use shared::{actor, PlayerState, DEFAULT_PORT};
use std::path::PathBuf;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Spawn column for new players
    #[arg(long, default_value_t = shared::DEFAULT_SPAWN.x, allow_hyphen_values = true)]
    spawn_x: i32,

    /// Spawn row for new players
    #[arg(long, default_value_t = shared::DEFAULT_SPAWN.y, allow_hyphen_values = true)]
    spawn_y: i32,

    /// Map file to take the spawn position from (overrides --spawn-x/--spawn-y)
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Capacity of the world actor's command queue
    #[arg(long, default_value = "1024")]
    mailbox: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let spawn = match &args.map {
        Some(path) => GameMap::load(path)?.spawn(),
        None => PlayerState::new(args.spawn_x, args.spawn_y),
    };
    info!("New players spawn at {}", spawn);

    let (world, world_task) = actor::spawn(World::new(spawn), args.mailbox);

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address, GameService::new(world.clone())).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server_task = tokio::spawn(server.run(shutdown_rx));

    tokio::select! {
        result = &mut server_task => {
            if let Err(e) = result {
                error!("Network task panicked: {}", e);
            }
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    let _ = shutdown_tx.send(true);
    world.shutdown();

    if !server_task.is_finished() {
        let _ = server_task.await;
    }
    let world = world_task.await?;
    info!("World stopped with {} players connected", world.player_count());

    Ok(())
}
