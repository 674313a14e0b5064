use clap::Parser;
use log::{error, info};
use server::config::GameConfig;
use server::network::{BoxError, Server};
use shared::{DEFAULT_FOOD_COUNT, DEFAULT_GRID_SIZE, DEFAULT_START_LENGTH};

/// Authoritative snake arena server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "10")]
    tick_rate: u32,

    /// Width and height of the square arena
    #[arg(short, long, default_value_t = DEFAULT_GRID_SIZE)]
    grid_size: i32,

    /// Number of food items kept on the grid
    #[arg(short, long, default_value_t = DEFAULT_FOOD_COUNT)]
    food: usize,

    /// Segments a snake spawns with
    #[arg(long, default_value_t = DEFAULT_START_LENGTH)]
    start_length: usize,

    /// Seconds a dead player waits before respawning
    #[arg(short, long, default_value = "3")]
    respawn_delay: u64,

    /// Maximum number of concurrent clients
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Seed for reproducible spawns
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = GameConfig {
        grid_size: args.grid_size,
        food_count: args.food,
        start_length: args.start_length,
        ticks_per_second: args.tick_rate,
        seed: args.seed,
        ..GameConfig::default()
    }
    .with_respawn_delay_secs(args.respawn_delay);

    let address = format!("{}:{}", args.host, args.port);
    info!(
        "Starting server on {} ({} ticks/s, {}x{} grid)",
        address, config.ticks_per_second, config.grid_size, config.grid_size
    );

    let mut server = Server::new(&address, config, args.max_clients).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
