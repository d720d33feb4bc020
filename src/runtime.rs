// Command ingestion loop
//
// Drains drive commands from zenoh at a fixed rate and dispatches them to
// the two drivers of the actuator layer. Scripted movements and the teleop
// loop must never hold the motors at the same time; that mode switch is
// enforced here, not in the core. Shutdown always funnels through emergency
// stop + cleanup, so any exit leaves the robot stopped with its lines
// released.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval};
use tracing::{error, info, warn};

use crate::config::{CMD_TIMEOUT, LOOP_HZ, MOTOR_LAYOUT, PWM_FREQUENCY_HZ, TOPIC_CMD_DRIVE, TOPIC_HEALTH};
use crate::messages::{DriveCommand, RuntimeHealth};
use crate::motor::gpio::GpioBackend;
use crate::motor::{DriveError, MotorController, MoveProfile, MovementCoordinator};
use crate::teleop::{InputVector, TeleopDriveLoop};

enum Flow {
    Continue,
    Quit,
}

struct TeleopSession {
    inputs: mpsc::Sender<InputVector>,
    task: JoinHandle<Result<(), DriveError>>,
    last_input: Instant,
}

struct Runtime {
    controller: Arc<MotorController>,
    coordinator: MovementCoordinator,
    teleop: Option<TeleopSession>,
}

impl Runtime {
    fn new(controller: Arc<MotorController>) -> Self {
        let coordinator = MovementCoordinator::new(Arc::clone(&controller), MoveProfile::default());
        Self {
            controller,
            coordinator,
            teleop: None,
        }
    }

    async fn on_command(&mut self, cmd: DriveCommand) -> Result<Flow, DriveError> {
        match cmd {
            DriveCommand::Teleop { x, y, r } => {
                self.feed_teleop(InputVector { x, y, r }).await?;
            }
            DriveCommand::Move { movement } => {
                // mode switch: wind down teleop before a scripted movement
                self.stop_teleop().await?;
                self.coordinator.execute(movement).await?;
            }
            DriveCommand::EmergencyStop => {
                self.controller.emergency_stop().await?;
            }
            DriveCommand::ResetEmergencyStop => {
                self.controller.reset_emergency_stop();
            }
            DriveCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Forward one teleop sample, starting the drive loop on first use.
    async fn feed_teleop(&mut self, sample: InputVector) -> Result<(), DriveError> {
        if self.teleop.is_none() {
            let (tx, rx) = mpsc::channel(32);
            let drive_loop = TeleopDriveLoop::new(Arc::clone(&self.controller));
            info!("teleop session started");
            self.teleop = Some(TeleopSession {
                inputs: tx,
                task: tokio::spawn(drive_loop.run(rx)),
                last_input: Instant::now(),
            });
        }

        if let Some(session) = self.teleop.as_mut() {
            session.last_input = Instant::now();
            if session.inputs.send(sample).await.is_err() {
                // the loop died on its own; surface why
                return self.stop_teleop().await;
            }
        }
        Ok(())
    }

    /// Wind down an active teleop session and surface its result.
    async fn stop_teleop(&mut self) -> Result<(), DriveError> {
        let Some(session) = self.teleop.take() else {
            return Ok(());
        };
        drop(session.inputs);
        match session.task.await {
            Ok(Ok(())) => {
                info!("teleop session stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(join_err) => Err(DriveError::TaskFailed {
                reason: join_err.to_string(),
            }),
        }
    }

    fn health(&self) -> RuntimeHealth {
        if self.controller.emergency_stopped() {
            RuntimeHealth::EmergencyStopped
        } else if matches!(&self.teleop, Some(s) if s.last_input.elapsed() > CMD_TIMEOUT) {
            RuntimeHealth::CmdStale
        } else {
            RuntimeHealth::Ok
        }
    }
}

pub async fn run(
    mut backend: Box<dyn GpioBackend>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let controller = Arc::new(MotorController::setup(
        backend.as_mut(),
        &MOTOR_LAYOUT,
        PWM_FREQUENCY_HZ,
    )?);
    let mut runtime = Runtime::new(Arc::clone(&controller));
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {}Hz loop, {}ms teleop watchdog",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {TOPIC_CMD_DRIVE}");
    info!("Publishing health to: {TOPIC_HEALTH}");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let result: Result<(), Box<dyn std::error::Error + Send + Sync>> = 'main: loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("interrupt received, shutting down");
                break 'main Ok(());
            }
            _ = tick.tick() => {}
        }

        // 1. Drain all pending commands (non-blocking)
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            let cmd = match serde_json::from_slice::<DriveCommand>(&payload) {
                Ok(cmd) => cmd,
                Err(e) => {
                    warn!("Failed to parse command: {e}");
                    continue;
                }
            };
            match runtime.on_command(cmd).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => {
                    info!("quit command received");
                    break 'main Ok(());
                }
                Err(e) => {
                    error!("drive command failed: {e}");
                    break 'main Err(e.into());
                }
            }
        }

        // 2. Publish health (advisory; a failed publish never stops driving)
        match serde_json::to_string(&runtime.health()) {
            Ok(health_json) => {
                if let Err(e) = pub_health.put(health_json).await {
                    warn!("health publish failed: {e}");
                }
            }
            Err(e) => warn!("health encode failed: {e}"),
        }
    };

    // Teardown runs on every exit path: stop the drivers, stop the motors,
    // release the lines.
    if let Err(e) = runtime.stop_teleop().await {
        error!("teleop session ended with error: {e}");
    }
    if let Err(e) = controller.emergency_stop().await {
        error!("final motor stop failed: {e}");
    }
    controller.cleanup().await;
    info!("runtime stopped");

    result
}
