// Whole-robot movement commands
//
// Each catalog movement is a fixed list of (motor id, logical direction)
// instructions. Executing one spawns a task per instruction that runs the
// full ramp-up / hold / ramp-down / stop sequence, and the call only returns
// once every task has joined, so all participating wheels start and finish
// together.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info};

use super::controller::{DriveError, MotorController};
use super::driver::{ALL_MOTOR_IDS, Direction, MAX_DUTY_CYCLE};
use super::ramp::RampOutcome;
use crate::config;

/// The fixed movement catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Movement {
    Forward,
    Backward,
    StrafeLeft,
    StrafeRight,
    TurnLeft,
    TurnRight,
    ForwardLeft,
    ForwardRight,
    BackwardLeft,
    BackwardRight,
}

impl Movement {
    pub const ALL: [Movement; 10] = [
        Movement::Forward,
        Movement::Backward,
        Movement::StrafeLeft,
        Movement::StrafeRight,
        Movement::TurnLeft,
        Movement::TurnRight,
        Movement::ForwardLeft,
        Movement::ForwardRight,
        Movement::BackwardLeft,
        Movement::BackwardRight,
    ];

    /// Logical (motor id, direction) instructions. The diagonals drive only
    /// the two wheels whose rollers contribute to that direction.
    pub fn instructions(self) -> &'static [(u8, Direction)] {
        use Direction::{Backward, Forward};
        match self {
            Movement::Forward => &[(1, Forward), (2, Forward), (3, Forward), (4, Forward)],
            Movement::Backward => &[(1, Backward), (2, Backward), (3, Backward), (4, Backward)],
            Movement::StrafeLeft => &[(1, Forward), (2, Forward), (3, Forward), (4, Backward)],
            Movement::StrafeRight => &[(1, Backward), (2, Backward), (3, Forward), (4, Backward)],
            Movement::TurnLeft => &[(1, Backward), (2, Forward), (3, Forward), (4, Backward)],
            Movement::TurnRight => &[(1, Forward), (2, Backward), (3, Backward), (4, Forward)],
            Movement::ForwardLeft => &[(1, Forward), (4, Forward)],
            Movement::ForwardRight => &[(2, Backward), (3, Forward)],
            Movement::BackwardLeft => &[(2, Forward), (3, Backward)],
            Movement::BackwardRight => &[(1, Backward), (4, Backward)],
        }
    }

    fn name(self) -> &'static str {
        match self {
            Movement::Forward => "forward",
            Movement::Backward => "backward",
            Movement::StrafeLeft => "strafe_left",
            Movement::StrafeRight => "strafe_right",
            Movement::TurnLeft => "turn_left",
            Movement::TurnRight => "turn_right",
            Movement::ForwardLeft => "forward_left",
            Movement::ForwardRight => "forward_right",
            Movement::BackwardLeft => "backward_left",
            Movement::BackwardRight => "backward_right",
        }
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Movement {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Movement::ALL
            .into_iter()
            .find(|movement| movement.name() == s)
            .ok_or_else(|| DriveError::UnknownMovement {
                name: s.to_string(),
            })
    }
}

/// Speed schedule for scripted movements.
#[derive(Debug, Clone, Copy)]
pub struct MoveProfile {
    pub startup_speed: f32,
    pub max_speed: f32,
    pub step_delay: Duration,
    pub run_time: Duration,
}

impl Default for MoveProfile {
    fn default() -> Self {
        Self {
            startup_speed: config::STARTUP_SPEED,
            max_speed: MAX_DUTY_CYCLE,
            step_delay: config::RAMP_STEP_DELAY,
            run_time: config::MOVE_RUN_TIME,
        }
    }
}

/// Executes catalog movements against a shared controller.
pub struct MovementCoordinator {
    controller: Arc<MotorController>,
    profile: MoveProfile,
}

impl MovementCoordinator {
    pub fn new(controller: Arc<MotorController>, profile: MoveProfile) -> Self {
        Self {
            controller,
            profile,
        }
    }

    /// Run one movement to completion. Returns once every participating
    /// motor has finished its sequence and stopped; a hardware failure in
    /// any task stops the whole robot and surfaces here.
    pub async fn execute(&self, movement: Movement) -> Result<(), DriveError> {
        let instructions = movement.instructions();
        info!(
            "executing {movement} across {} motors",
            instructions.len()
        );

        // Park the wheels this movement does not drive, so a diagonal after
        // teleop cannot leave a wheel spinning.
        for id in ALL_MOTOR_IDS {
            if instructions.iter().all(|&(active, _)| active != id) {
                self.controller
                    .set_motor_direction(id, Direction::Stopped)
                    .await?;
                self.controller.set_motor_speed(id, 0.0).await?;
            }
        }

        let mut tasks = JoinSet::new();
        for &(id, direction) in instructions {
            let controller = Arc::clone(&self.controller);
            let profile = self.profile;
            tasks.spawn(async move { run_motor_sequence(controller, id, direction, profile).await });
        }

        let mut first_failure: Option<DriveError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_failure.get_or_insert(e);
                }
                Err(join_err) => {
                    first_failure.get_or_insert(DriveError::TaskFailed {
                        reason: join_err.to_string(),
                    });
                }
            }
        }
        match first_failure {
            None => {
                info!("{movement} complete");
                Ok(())
            }
            Some(e) => Err(e),
        }
    }
}

/// One motor's full sequence; a failure anywhere stops the whole robot
/// before the error propagates to the joining coordinator.
async fn run_motor_sequence(
    controller: Arc<MotorController>,
    id: u8,
    direction: Direction,
    profile: MoveProfile,
) -> Result<(), DriveError> {
    let sequence = drive_motor(&controller, id, direction, profile).await;
    if let Err(ref e) = sequence {
        error!("motor {id} failed mid-movement, stopping all motors: {e}");
        if let Err(stop_err) = controller.emergency_stop().await {
            error!("emergency stop after motor {id} failure also failed: {stop_err}");
        }
    }
    sequence
}

async fn drive_motor(
    controller: &MotorController,
    id: u8,
    direction: Direction,
    profile: MoveProfile,
) -> Result<(), DriveError> {
    controller.set_motor_direction(id, direction).await?;
    let up = controller
        .accelerate_motor(id, profile.startup_speed, profile.max_speed, profile.step_delay)
        .await?;
    if up == RampOutcome::Completed {
        sleep(profile.run_time).await;
        controller
            .accelerate_motor(id, profile.max_speed, profile.startup_speed, profile.step_delay)
            .await?;
    }
    // an aborted ramp skips straight to the explicit stop
    controller.set_motor_direction(id, Direction::Stopped).await?;
    controller.set_motor_speed(id, 0.0).await?;
    debug!("motor {id} stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::controller::tests::{TEST_LAYOUT, controller};
    use crate::motor::gpio::SimulatedBackend;

    fn quick_profile() -> MoveProfile {
        MoveProfile {
            startup_speed: 10.0,
            max_speed: 100.0,
            step_delay: Duration::ZERO,
            run_time: Duration::ZERO,
        }
    }

    fn coordinator(backend: &mut SimulatedBackend) -> MovementCoordinator {
        MovementCoordinator::new(Arc::new(controller(backend)), quick_profile())
    }

    #[test]
    fn test_catalog_instruction_tables() {
        use Direction::{Backward, Forward};
        assert_eq!(
            Movement::Forward.instructions(),
            &[(1, Forward), (2, Forward), (3, Forward), (4, Forward)]
        );
        assert_eq!(
            Movement::TurnLeft.instructions(),
            &[(1, Backward), (2, Forward), (3, Forward), (4, Backward)]
        );
        // diagonals touch exactly two motors
        assert_eq!(Movement::ForwardLeft.instructions().len(), 2);
        assert_eq!(Movement::BackwardRight.instructions().len(), 2);
    }

    #[test]
    fn test_movement_name_round_trip() {
        for movement in Movement::ALL {
            assert_eq!(movement.to_string().parse::<Movement>().unwrap(), movement);
        }
        match "pirouette".parse::<Movement>() {
            Err(DriveError::UnknownMovement { name }) => assert_eq!(name, "pirouette"),
            other => panic!("expected UnknownMovement, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_forward_runs_and_stops_all_motors() {
        let mut backend = SimulatedBackend::new();
        let coordinator = coordinator(&mut backend);

        coordinator.execute(Movement::Forward).await.unwrap();

        for (index, pins) in TEST_LAYOUT.iter().enumerate() {
            let id = index as u8 + 1;
            // barrier: by the time execute returns, every sequence reached
            // its terminal stop
            assert_eq!(
                coordinator.controller.motor_state(id).await.unwrap(),
                (Direction::Stopped, 0.0)
            );
            // and every wheel ramped to full duty on the way
            assert!(
                backend.duty_history(pins.enable).contains(&100.0),
                "motor {id} never reached max speed"
            );
        }
    }

    #[tokio::test]
    async fn test_diagonal_parks_unused_motors() {
        let mut backend = SimulatedBackend::new();
        let coordinator = coordinator(&mut backend);

        // leave motors 2 and 3 running, as a teleop session would
        coordinator
            .controller
            .set_motor_direction(2, Direction::Forward)
            .await
            .unwrap();
        coordinator.controller.set_motor_speed(2, 40.0).await.unwrap();
        coordinator
            .controller
            .set_motor_direction(3, Direction::Backward)
            .await
            .unwrap();
        coordinator.controller.set_motor_speed(3, 40.0).await.unwrap();

        // forward-left drives only motors 1 and 4
        coordinator.execute(Movement::ForwardLeft).await.unwrap();

        for id in [2u8, 3] {
            assert_eq!(
                coordinator.controller.motor_state(id).await.unwrap(),
                (Direction::Stopped, 0.0)
            );
        }
        // the driven pair still ran its full sequence
        assert!(backend.duty_history(12).contains(&100.0));
        assert!(backend.duty_history(19).contains(&100.0));
    }

    #[tokio::test]
    async fn test_motor_fault_triggers_emergency_stop_and_propagates() {
        let mut backend = SimulatedBackend::new();
        let coordinator = coordinator(&mut backend);

        // motor 4's PWM line fails on the first ramp write
        backend.set_failing(19, true);

        let result = coordinator.execute(Movement::Forward).await;
        assert!(result.is_err());
        assert!(coordinator.controller.emergency_stopped());

        // the healthy motors were all forced to a stop
        for id in [1u8, 2, 3] {
            assert_eq!(
                coordinator.controller.motor_state(id).await.unwrap(),
                (Direction::Stopped, 0.0)
            );
        }
    }

    #[tokio::test]
    async fn test_execute_with_latched_stop_leaves_motors_stopped() {
        let mut backend = SimulatedBackend::new();
        let coordinator = coordinator(&mut backend);

        coordinator.controller.emergency_stop().await.unwrap();
        coordinator.execute(Movement::Backward).await.unwrap();

        for id in ALL_MOTOR_IDS {
            assert_eq!(
                coordinator.controller.motor_state(id).await.unwrap(),
                (Direction::Stopped, 0.0)
            );
            // ramps aborted before any duty step was applied
            let history = backend.duty_history(TEST_LAYOUT[usize::from(id) - 1].enable);
            assert!(!history.contains(&100.0));
        }
    }
}
