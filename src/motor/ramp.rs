// Stepped acceleration and deceleration ramps
//
// A ramp walks the integer duty values between two endpoints, one percent per
// step, sleeping between steps. The abort predicate (the controller wires in
// the emergency-stop flag) is checked before every step; an aborted ramp
// leaves the motor at its current duty and the caller owns the follow-up
// stop.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use super::driver::{MAX_DUTY_CYCLE, Motor};
use super::gpio::GpioError;

/// How a ramp finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampOutcome {
    /// Every step up to the target duty was applied.
    Completed,
    /// The abort predicate fired; the motor keeps its last applied duty.
    Aborted,
}

/// Walk `motor` from `start_speed` to `end_speed` inclusive, one duty-cycle
/// unit per `step_delay`. Endpoints are clamped to [0, 100]; the walk
/// direction follows the sign of `end_speed - start_speed`.
pub async fn run(
    motor: &mut Motor,
    start_speed: f32,
    end_speed: f32,
    step_delay: Duration,
    should_abort: impl Fn() -> bool,
) -> Result<RampOutcome, GpioError> {
    let start = start_speed.clamp(0.0, MAX_DUTY_CYCLE) as i32;
    let end = end_speed.clamp(0.0, MAX_DUTY_CYCLE) as i32;
    let step = if start < end { 1 } else { -1 };

    let mut duty = start;
    loop {
        if should_abort() {
            debug!("motor {} ramp aborted at {}%", motor.id(), motor.speed());
            return Ok(RampOutcome::Aborted);
        }
        motor.set_speed(duty as f32)?;
        if duty == end {
            break;
        }
        sleep(step_delay).await;
        duty += step;
    }
    debug!("motor {} reached {end}% duty cycle", motor.id());
    Ok(RampOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::gpio::{GpioBackend, SimulatedBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn build_motor(backend: &mut SimulatedBackend) -> Motor {
        let in1 = backend.claim_output(5).unwrap();
        let in2 = backend.claim_output(6).unwrap();
        let pwm = backend.claim_pwm(12, 1000).unwrap();
        Motor::new(1, in1, in2, pwm, false).unwrap()
    }

    /// Duty values the ramp applied, skipping the 0% the PWM started at.
    fn applied(backend: &SimulatedBackend) -> Vec<f32> {
        backend.duty_history(12)[1..].to_vec()
    }

    #[tokio::test]
    async fn test_ascending_ramp_visits_every_step() {
        let mut backend = SimulatedBackend::new();
        let mut motor = build_motor(&mut backend);

        let outcome = run(&mut motor, 10.0, 15.0, Duration::ZERO, || false)
            .await
            .unwrap();
        assert_eq!(outcome, RampOutcome::Completed);
        assert_eq!(applied(&backend), vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        assert_eq!(motor.speed(), 15.0);
    }

    #[tokio::test]
    async fn test_descending_ramp_visits_every_step() {
        let mut backend = SimulatedBackend::new();
        let mut motor = build_motor(&mut backend);

        let outcome = run(&mut motor, 4.0, 0.0, Duration::ZERO, || false)
            .await
            .unwrap();
        assert_eq!(outcome, RampOutcome::Completed);
        assert_eq!(applied(&backend), vec![4.0, 3.0, 2.0, 1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_equal_endpoints_apply_once() {
        let mut backend = SimulatedBackend::new();
        let mut motor = build_motor(&mut backend);

        let outcome = run(&mut motor, 30.0, 30.0, Duration::ZERO, || false)
            .await
            .unwrap();
        assert_eq!(outcome, RampOutcome::Completed);
        assert_eq!(applied(&backend), vec![30.0]);
    }

    #[tokio::test]
    async fn test_endpoints_clamped() {
        let mut backend = SimulatedBackend::new();
        let mut motor = build_motor(&mut backend);

        run(&mut motor, -3.0, 2.0, Duration::ZERO, || false)
            .await
            .unwrap();
        assert_eq!(applied(&backend), vec![0.0, 1.0, 2.0]);

        let outcome = run(&mut motor, 98.0, 130.0, Duration::ZERO, || false)
            .await
            .unwrap();
        assert_eq!(outcome, RampOutcome::Completed);
        assert_eq!(motor.speed(), 100.0);
    }

    #[tokio::test]
    async fn test_abort_stops_at_current_duty() {
        let mut backend = SimulatedBackend::new();
        let mut motor = build_motor(&mut backend);

        // allow three steps, then abort
        let checks = AtomicUsize::new(0);
        let outcome = run(&mut motor, 0.0, 100.0, Duration::ZERO, || {
            checks.fetch_add(1, Ordering::SeqCst) >= 3
        })
        .await
        .unwrap();

        assert_eq!(outcome, RampOutcome::Aborted);
        assert_eq!(applied(&backend), vec![0.0, 1.0, 2.0]);
        // the ramp does not zero the motor itself
        assert_eq!(motor.speed(), 2.0);
    }

    #[tokio::test]
    async fn test_abort_before_first_step_writes_nothing() {
        let mut backend = SimulatedBackend::new();
        let mut motor = build_motor(&mut backend);
        motor.set_speed(50.0).unwrap();

        let outcome = run(&mut motor, 0.0, 100.0, Duration::ZERO, || true)
            .await
            .unwrap();
        assert_eq!(outcome, RampOutcome::Aborted);
        assert_eq!(motor.speed(), 50.0);
    }
}
