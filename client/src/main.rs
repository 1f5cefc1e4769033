use clap::Parser;
use client::network::Client;
use log::{info, warn};
use rand::Rng;
use shared::{Command, Direction};
use std::time::Duration;
use tokio::time::{interval, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server URL to connect to
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080")]
    server: String,

    /// Milliseconds between commands
    #[arg(short = 'i', long, default_value = "500")]
    interval: u64,

    /// Seconds to stay connected
    #[arg(short = 'd', long, default_value = "30")]
    duration: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting bot...");
    let mut client = Client::connect(&args.server).await?;

    // Wait for the snapshot before sending anything
    while client.player_id().is_none() {
        client.recv_events().await?;
    }
    let player_id = client.player_id().unwrap_or_default();
    info!(
        "Joined as player {} with {} units in the world",
        player_id,
        client.world().units.len()
    );

    let mut command_interval = interval(Duration::from_millis(args.interval.max(1)));
    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut last_step = Instant::now();
    let mut rng = rand::thread_rng();

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,

            result = client.recv_events() => {
                let events = result?;
                let now = Instant::now();
                client.world_mut().step((now - last_step).as_secs_f32());
                last_step = now;

                for event in events {
                    info!("Received {}", event.name());
                }
            }

            _ = command_interval.tick() => {
                let command = if rng.gen_bool(0.2) {
                    Command::Stop { player_id }
                } else {
                    let direction = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
                    Command::Move { player_id, direction }
                };

                if let Err(e) = client.send_command(&command).await {
                    warn!("Error sending command: {}", e);
                    break;
                }
            }
        }
    }

    if let Some(unit) = client.world().own_unit() {
        info!("Final position ({:.1}, {:.1})", unit.x, unit.y);
    }
    client.close().await?;

    Ok(())
}
