// Motor coordination core for the mecanum base
//
// Provides:
// - Per-motor hardware ownership over the GPIO seam (direction pair + PWM)
// - Stepped, abortable acceleration ramps
// - A locked four-motor controller with emergency stop and one-shot teardown
// - The whole-robot movement catalog, executed as joined per-motor tasks
// - Mecanum inverse kinematics for the continuous teleop path

pub mod gpio;
pub mod kinematics;
pub mod ramp;

mod controller;
mod coordinator;
mod driver;

pub use controller::{DriveError, MotorController};
pub use coordinator::{MoveProfile, Movement, MovementCoordinator};
pub use driver::{
    ALL_MOTOR_IDS, Direction, MAX_DUTY_CYCLE, MOTOR_FRONT_LEFT, MOTOR_FRONT_RIGHT,
    MOTOR_REAR_LEFT, MOTOR_REAR_RIGHT, Motor, MotorPins,
};
pub use kinematics::{WheelCommand, vector_to_wheels};
pub use ramp::RampOutcome;
