// Continuous drive from a live input vector
//
// Fixed-rate loop: drain the freshest (x, y, r) sample, run the mecanum
// inverse kinematics, and apply direction + duty straight through the
// controller's locked setters. No ramps on this path; it trades smoothness
// for input latency. A watchdog treats stale input as a released stick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{Instant, interval};
use tracing::{error, info, warn};

use crate::config::{CMD_TIMEOUT, LOOP_HZ};
use crate::motor::kinematics;
use crate::motor::{ALL_MOTOR_IDS, Direction, DriveError, MotorController};

/// One sampled input vector, each axis in [-1, 1].
#[derive(Debug, Clone, Copy, Default)]
pub struct InputVector {
    pub x: f32,
    pub y: f32,
    pub r: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeleopState {
    Idle,
    Running,
    Stopped,
}

/// Single-shot drive loop; restart by constructing a new one.
pub struct TeleopDriveLoop {
    controller: Arc<MotorController>,
    deadzone: f32,
    tick_period: Duration,
    state: TeleopState,
}

impl TeleopDriveLoop {
    pub fn new(controller: Arc<MotorController>) -> Self {
        Self {
            controller,
            deadzone: kinematics::DEADZONE,
            tick_period: Duration::from_millis(1000 / LOOP_HZ),
            state: TeleopState::Idle,
        }
    }

    pub fn state(&self) -> TeleopState {
        self.state
    }

    /// Drive the motors from `inputs` until the channel closes. On the way
    /// out every motor is zeroed; process-level teardown (emergency stop +
    /// cleanup) belongs to the owning runtime.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<InputVector>) -> Result<(), DriveError> {
        self.state = TeleopState::Running;
        info!("teleop loop running at {LOOP_HZ} Hz");

        let mut latest = InputVector::default();
        let mut received_at = Instant::now();
        let mut stale = false;
        let mut tick = interval(self.tick_period);

        loop {
            tick.tick().await;

            // Drain pending samples (non-blocking), keep the newest.
            loop {
                match inputs.try_recv() {
                    Ok(sample) => {
                        latest = sample;
                        received_at = Instant::now();
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        return self.shutdown().await;
                    }
                }
            }

            // Watchdog: stale input behaves like a released stick.
            let mut vector = latest;
            if received_at.elapsed() > CMD_TIMEOUT {
                if !stale {
                    warn!(
                        "teleop input stale ({:?} old), zeroing motors",
                        received_at.elapsed()
                    );
                    stale = true;
                }
                vector = InputVector::default();
            } else {
                stale = false;
            }

            // While the emergency stop is latched the motors are not ours.
            if self.controller.emergency_stopped() {
                continue;
            }

            if let Err(e) = self.apply(vector).await {
                error!("teleop drive failed, stopping all motors: {e}");
                if let Err(stop_err) = self.controller.emergency_stop().await {
                    error!("emergency stop after teleop failure also failed: {stop_err}");
                }
                self.state = TeleopState::Stopped;
                return Err(e);
            }
        }
    }

    /// Inverse kinematics plus direct, un-ramped application.
    async fn apply(&self, vector: InputVector) -> Result<(), DriveError> {
        let wheels =
            kinematics::vector_to_wheels_with_deadzone(vector.x, vector.y, vector.r, self.deadzone);
        for (index, wheel) in wheels.iter().enumerate() {
            let id = index as u8 + 1;
            self.controller.set_motor_direction(id, wheel.direction).await?;
            self.controller.set_motor_speed(id, wheel.duty).await?;
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), DriveError> {
        for id in ALL_MOTOR_IDS {
            self.controller
                .set_motor_direction(id, Direction::Stopped)
                .await?;
            self.controller.set_motor_speed(id, 0.0).await?;
        }
        self.state = TeleopState::Stopped;
        info!("teleop loop stopped");
        Ok(())
    }
}
