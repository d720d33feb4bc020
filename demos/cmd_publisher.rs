// Keyboard drive: WASD move, Z/X rotate, R/F speed tier,
// numpad-style movement keys (8/2/4/6 translate, 1/3 turn, 7/9/B/N
// diagonals), SPACE emergency stop, E reset, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use mecanum_zenoh_runtime::config::TOPIC_CMD_DRIVE;
use mecanum_zenoh_runtime::messages::DriveCommand;
use mecanum_zenoh_runtime::motor::Movement;

const SPEEDS: [f32; 3] = [0.25, 0.5, 1.0]; // stick deflection per tier
const INPUT_TIMEOUT_MS: u64 = 100; // Reset axes after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_DRIVE).await?;

    info!("Controls: WASD=move, Z/X=rotate, R/F=speed, 8/2/4/6=translate, 1/3=turn, 7/9/B/N=diagonal");
    info!("          SPACE=emergency stop, E=reset stop, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_drive(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_drive(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;

    // Persistent axis state
    let mut x = 0.0f32;
    let mut y = 0.0f32;
    let mut r = 0.0f32;
    let mut last_axis_input = Instant::now();

    loop {
        let mut movement: Option<Movement> = None;

        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    // Axes - update and refresh timestamp
                    KeyCode::Char('w') if pressed => {
                        y = SPEEDS[speed_idx];
                        last_axis_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        y = -SPEEDS[speed_idx];
                        last_axis_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        x = -SPEEDS[speed_idx];
                        last_axis_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        x = SPEEDS[speed_idx];
                        last_axis_input = Instant::now();
                    }
                    KeyCode::Char('z') if pressed => {
                        r = SPEEDS[speed_idx];
                        last_axis_input = Instant::now();
                    }
                    KeyCode::Char('x') if pressed => {
                        r = -SPEEDS[speed_idx];
                        last_axis_input = Instant::now();
                    }

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    // Scripted movements
                    KeyCode::Char('8') if pressed => movement = Some(Movement::Forward),
                    KeyCode::Char('2') if pressed => movement = Some(Movement::Backward),
                    KeyCode::Char('4') if pressed => movement = Some(Movement::StrafeLeft),
                    KeyCode::Char('6') if pressed => movement = Some(Movement::StrafeRight),
                    KeyCode::Char('1') if pressed => movement = Some(Movement::TurnLeft),
                    KeyCode::Char('3') if pressed => movement = Some(Movement::TurnRight),
                    KeyCode::Char('7') if pressed => movement = Some(Movement::ForwardLeft),
                    KeyCode::Char('9') if pressed => movement = Some(Movement::ForwardRight),
                    KeyCode::Char('b') if pressed => movement = Some(Movement::BackwardLeft),
                    KeyCode::Char('n') if pressed => movement = Some(Movement::BackwardRight),

                    // Safety
                    KeyCode::Char(' ') if pressed => {
                        publish(publisher, &DriveCommand::EmergencyStop).await?;
                        info!("emergency stop sent");
                    }
                    KeyCode::Char('e') if pressed => {
                        publish(publisher, &DriveCommand::ResetEmergencyStop).await?;
                        info!("emergency stop reset sent");
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => {
                        publish(publisher, &DriveCommand::Quit).await?;
                        break;
                    }

                    _ => {}
                }
            }
        }

        if let Some(movement) = movement {
            info!("movement: {movement}");
            publish(publisher, &DriveCommand::Move { movement }).await?;
            continue;
        }

        // Reset axes if no input for INPUT_TIMEOUT_MS
        if last_axis_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            x = 0.0;
            y = 0.0;
            r = 0.0;
        }

        // Always publish the teleop vector at ~50Hz
        publish(publisher, &DriveCommand::Teleop { x, y, r }).await?;
    }

    Ok(())
}

async fn publish(
    publisher: &zenoh::pubsub::Publisher<'_>,
    cmd: &DriveCommand,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    publisher.put(serde_json::to_string(cmd)?).await?;
    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
