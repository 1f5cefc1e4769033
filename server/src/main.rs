use clap::Parser;
use log::{error, info, warn};
use server::config::ServerConfig;
use server::game::World;
use server::network::Server;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Main-method of the application.
/// Parses command-line arguments, then spawns the network server and the game loop.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "8080")]
        port: u16,
        /// Seconds of peer silence before a connection is dropped
        #[clap(long, default_value = "60")]
        pong_wait: u64,
        /// Seconds allowed for a single socket write
        #[clap(long, default_value = "10")]
        write_wait: u64,
        /// Outbound messages buffered per connection
        #[clap(short, long, default_value = "256")]
        queue_capacity: usize,
        /// Tick rate (updates per second)
        #[clap(short, long, default_value = "30")]
        tick_rate: u32,
    }

    env_logger::init();
    let args = Args::parse();

    let config = ServerConfig::new(format!("{}:{}", args.host, args.port))
        .with_pong_wait(Duration::from_secs(args.pong_wait))
        .with_write_wait(Duration::from_secs(args.write_wait))
        .with_send_queue_capacity(args.queue_capacity)
        .with_tick_rate(args.tick_rate);
    let tick_rate = config.tick_rate;

    let world = Arc::new(World::new());
    let server = Server::bind(config, world.clone()).await?;

    // Spawn network task
    let server_handle = tokio::spawn(server.run());

    // Spawn game loop task
    let game_handle = {
        let world = Arc::clone(&world);
        tokio::spawn(async move {
            run_game_loop(world, tick_rate).await;
        })
    };

    // Handle shutdown gracefully
    tokio::select! {
        result = server_handle => {
            match result {
                Ok(Err(e)) => error!("Server stopped: {}", e),
                Err(e) => error!("Network task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        result = game_handle => {
            if let Err(e) = result {
                error!("Game loop task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}

/// Longest step fed to the world after a stall
const MAX_STEP: Duration = Duration::from_millis(50);

/// Advances the world at a fixed rate.
async fn run_game_loop(world: Arc<World>, tick_rate: u32) {
    let period = Duration::from_secs(1) / tick_rate.max(1);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut previous = Instant::now();
    loop {
        let now = ticker.tick().await;
        let elapsed = now.saturating_duration_since(previous);
        previous = now;

        if elapsed > MAX_STEP {
            warn!("World tick {} stalled for {:?}", world.tick(), elapsed);
        }
        world.step(elapsed.min(MAX_STEP).as_secs_f32());
    }
}
