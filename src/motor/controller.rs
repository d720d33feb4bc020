// Four-motor controller
//
// Owns the full actuator set behind one async mutex per motor, the shared
// emergency-stop flag every ramp polls, and the one-shot teardown guard.
// Every exit path of the process ends up in cleanup() or Drop, so the lines
// are released no matter how a run ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::driver::{Direction, Motor, MotorPins};
use super::gpio::{GpioBackend, GpioError};
use super::ramp::{self, RampOutcome};

/// Error types for drive operations
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error(transparent)]
    Gpio(#[from] GpioError),

    #[error("invalid motor id {id} (expected 1..=4)")]
    InvalidMotor { id: u8 },

    #[error("unknown movement '{name}'")]
    UnknownMovement { name: String },

    #[error("motor task failed: {reason}")]
    TaskFailed { reason: String },
}

pub struct MotorController {
    motors: [Mutex<Motor>; 4],
    emergency_stop: AtomicBool,
    cleanup_done: Mutex<bool>,
}

impl MotorController {
    /// Claim every line in `layout` and start all PWM channels at 0% duty.
    /// A failure part-way through releases whatever was already claimed
    /// before the error is returned.
    pub fn setup(
        backend: &mut dyn GpioBackend,
        layout: &[MotorPins; 4],
        pwm_frequency_hz: u32,
    ) -> Result<Self, DriveError> {
        let mut claimed: Vec<Motor> = Vec::with_capacity(layout.len());
        for (index, pins) in layout.iter().enumerate() {
            let id = index as u8 + 1;
            match Self::claim_motor(backend, id, pins, pwm_frequency_hz) {
                Ok(motor) => claimed.push(motor),
                Err(e) => {
                    warn!("claiming motor {id} failed, releasing partial setup: {e}");
                    for motor in &mut claimed {
                        if let Err(release_err) = motor.release() {
                            warn!("release of motor {} failed: {release_err}", motor.id());
                        }
                    }
                    return Err(e.into());
                }
            }
        }

        info!("all {} motors claimed, PWM running at 0%", claimed.len());
        let mut drain = claimed.into_iter();
        Ok(Self {
            motors: std::array::from_fn(|_| {
                Mutex::new(drain.next().expect("layout holds four motors"))
            }),
            emergency_stop: AtomicBool::new(false),
            cleanup_done: Mutex::new(false),
        })
    }

    fn claim_motor(
        backend: &mut dyn GpioBackend,
        id: u8,
        pins: &MotorPins,
        pwm_frequency_hz: u32,
    ) -> Result<Motor, GpioError> {
        let in1 = backend.claim_output(pins.in1)?;
        let in2 = backend.claim_output(pins.in2)?;
        let pwm = backend.claim_pwm(pins.enable, pwm_frequency_hz)?;
        Motor::new(id, in1, in2, pwm, pins.reversed)
    }

    /// Look up a motor slot, rejecting bad ids before any hardware access.
    fn motor(&self, id: u8) -> Result<&Mutex<Motor>, DriveError> {
        usize::from(id)
            .checked_sub(1)
            .and_then(|index| self.motors.get(index))
            .ok_or(DriveError::InvalidMotor { id })
    }

    /// Set one motor's logical direction. Calls for the same id are
    /// serialized by that motor's lock; different ids proceed concurrently.
    pub async fn set_motor_direction(&self, id: u8, direction: Direction) -> Result<(), DriveError> {
        let mut motor = self.motor(id)?.lock().await;
        motor.set_direction(direction)?;
        Ok(())
    }

    /// Set one motor's duty cycle (clamped to [0, 100] by the motor).
    pub async fn set_motor_speed(&self, id: u8, duty: f32) -> Result<(), DriveError> {
        let mut motor = self.motor(id)?.lock().await;
        motor.set_speed(duty)?;
        Ok(())
    }

    /// Last commanded (direction, duty) for one motor.
    pub async fn motor_state(&self, id: u8) -> Result<(Direction, f32), DriveError> {
        let motor = self.motor(id)?.lock().await;
        Ok((motor.direction(), motor.speed()))
    }

    /// Ramp one motor between two duty values. The motor's lock is held for
    /// the whole ramp, making it atomic with respect to other writers; the
    /// emergency-stop flag is the abort predicate.
    pub async fn accelerate_motor(
        &self,
        id: u8,
        start_speed: f32,
        end_speed: f32,
        step_delay: Duration,
    ) -> Result<RampOutcome, DriveError> {
        let mut motor = self.motor(id)?.lock().await;
        let outcome = ramp::run(&mut motor, start_speed, end_speed, step_delay, || {
            self.emergency_stopped()
        })
        .await?;
        Ok(outcome)
    }

    pub fn emergency_stopped(&self) -> bool {
        self.emergency_stop.load(Ordering::SeqCst)
    }

    /// Latch the stop flag, then force every motor to Stopped/0% in id
    /// order. In-flight ramps see the flag at their next step; by the time
    /// this returns all four motors are physically stopped. A write failure
    /// on one motor does not keep the others from stopping.
    pub async fn emergency_stop(&self) -> Result<(), DriveError> {
        self.emergency_stop.store(true, Ordering::SeqCst);
        warn!("emergency stop engaged");

        let mut first_failure: Option<GpioError> = None;
        for slot in &self.motors {
            let mut motor = slot.lock().await;
            let halted = motor
                .set_direction(Direction::Stopped)
                .and_then(|()| motor.set_speed(0.0));
            if let Err(e) = halted {
                warn!("stopping motor {} failed: {e}", motor.id());
                first_failure.get_or_insert(e);
            }
        }
        match first_failure {
            None => Ok(()),
            Some(e) => Err(e.into()),
        }
    }

    /// Clear the stop latch. Only call once prior emergency motion has
    /// settled.
    pub fn reset_emergency_stop(&self) {
        self.emergency_stop.store(false, Ordering::SeqCst);
        info!("emergency stop cleared");
    }

    /// Idempotent teardown: halt all PWM, drive every line low. Failures
    /// are logged, never returned; repeated calls are no-ops.
    pub async fn cleanup(&self) {
        let mut done = self.cleanup_done.lock().await;
        if *done {
            return;
        }
        for slot in &self.motors {
            let mut motor = slot.lock().await;
            if let Err(e) = motor.release() {
                warn!("motor {} teardown failed: {e}", motor.id());
            }
        }
        *done = true;
        info!("all motors stopped and lines released");
    }
}

impl Drop for MotorController {
    fn drop(&mut self) {
        // safety net for exit paths that never reached cleanup()
        if *self.cleanup_done.get_mut() {
            return;
        }
        for slot in &mut self.motors {
            let motor = slot.get_mut();
            if let Err(e) = motor.release() {
                warn!("motor {} teardown failed on drop: {e}", motor.id());
            }
        }
    }
}
