// Drive test: careful, step-by-step exercise of the coordination core
// against the simulated GPIO backend: no hardware, no zenoh.
//
// Usage: cargo run --example drive_test
//
// Walks the whole movement catalog with a shortened profile, then
// demonstrates the emergency stop pre-empting a ramp, then tears down.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use mecanum_zenoh_runtime::config::{MOTOR_LAYOUT, PWM_FREQUENCY_HZ};
use mecanum_zenoh_runtime::motor::gpio::SimulatedBackend;
use mecanum_zenoh_runtime::motor::{
    ALL_MOTOR_IDS, MotorController, MoveProfile, Movement, MovementCoordinator,
};

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush().unwrap();
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();
    input.trim().eq_ignore_ascii_case("y")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    println!("Mecanum drive test (simulated backend)");
    println!("Every pin write lands in memory; watch the duty histories.");
    println!();

    let mut backend = SimulatedBackend::new();
    let controller = Arc::new(MotorController::setup(
        &mut backend,
        &MOTOR_LAYOUT,
        PWM_FREQUENCY_HZ,
    )?);
    println!("✓ All lines claimed, PWM running at 0%");
    println!();

    // Short profile so the full catalog runs in a few seconds
    let profile = MoveProfile {
        startup_speed: 10.0,
        max_speed: 100.0,
        step_delay: Duration::from_millis(2),
        run_time: Duration::from_millis(200),
    };
    let coordinator = MovementCoordinator::new(Arc::clone(&controller), profile);

    // ========== STEP 1: movement catalog ==========
    if !confirm("Run the full movement catalog?") {
        controller.cleanup().await;
        return Ok(());
    }

    for movement in Movement::ALL {
        println!("  Executing: {movement}...");
        coordinator.execute(movement).await?;
        for id in ALL_MOTOR_IDS {
            let (direction, duty) = controller.motor_state(id).await?;
            assert_eq!(duty, 0.0);
            println!("    motor {id}: {direction} at {duty}%");
        }
    }
    println!("✓ Catalog complete, all motors back at rest");
    println!();

    // ========== STEP 2: emergency stop pre-empts a ramp ==========
    if !confirm("Demonstrate emergency stop during a ramp?") {
        controller.cleanup().await;
        return Ok(());
    }

    let ramping = Arc::clone(&controller);
    let ramp_task = tokio::spawn(async move {
        ramping
            .accelerate_motor(1, 0.0, 100.0, Duration::from_millis(10))
            .await
    });

    tokio::time::sleep(Duration::from_millis(150)).await;
    controller.emergency_stop().await?;
    let outcome = ramp_task.await??;
    println!("  ramp outcome: {outcome:?}");

    for id in ALL_MOTOR_IDS {
        let (direction, duty) = controller.motor_state(id).await?;
        println!("  motor {id}: {direction} at {duty}%");
    }
    let history = backend.duty_history(MOTOR_LAYOUT[0].enable);
    println!(
        "  motor 1 saw {} duty writes, peak {:.0}%",
        history.len(),
        history.iter().fold(0.0f32, |acc, d| acc.max(*d))
    );
    controller.reset_emergency_stop();
    println!("✓ Emergency stop verified, latch cleared");
    println!();

    // ========== FINAL: teardown ==========
    controller.cleanup().await;
    controller.cleanup().await; // idempotent
    println!("✓ PWM halted and lines released");

    Ok(())
}
