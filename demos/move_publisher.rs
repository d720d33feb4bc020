// One-shot movement publisher
//
// Usage: cargo run --example move_publisher -- strafe_left
//        cargo run --example move_publisher -- forward --repeat 3

use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use mecanum_zenoh_runtime::config::TOPIC_CMD_DRIVE;
use mecanum_zenoh_runtime::messages::DriveCommand;
use mecanum_zenoh_runtime::motor::Movement;

#[derive(Parser)]
#[command(about = "Publish a drive movement to the runtime")]
struct Args {
    /// Movement name: forward, backward, strafe_left, strafe_right,
    /// turn_left, turn_right, forward_left, forward_right, backward_left,
    /// backward_right
    #[arg(value_parser = Movement::from_str)]
    movement: Movement,

    /// Publish the movement this many times, back to back
    #[arg(long, default_value_t = 1)]
    repeat: u32,

    /// Pause between repeats, in milliseconds
    #[arg(long, default_value_t = 500)]
    pause_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_DRIVE).await?;

    for n in 1..=args.repeat {
        info!("publishing {} ({n}/{})", args.movement, args.repeat);
        let cmd = DriveCommand::Move {
            movement: args.movement,
        };
        publisher.put(serde_json::to_string(&cmd)?).await?;
        if n < args.repeat {
            tokio::time::sleep(Duration::from_millis(args.pause_ms)).await;
        }
    }

    Ok(())
}
