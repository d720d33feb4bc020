// Mecanum inverse kinematics
//
// Converts a body-frame input vector (x strafe, y forward, r rotation), each
// axis in [-1, 1], into per-wheel direction + duty-cycle commands. Used by
// the teleop path only; scripted movements come from the fixed catalog.

use super::driver::{Direction, MAX_DUTY_CYCLE};

/// Axis values below this magnitude are treated as stick noise.
pub const DEADZONE: f32 = 0.1;

/// Direction and duty cycle for one wheel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelCommand {
    pub direction: Direction,
    pub duty: f32,
}

/// Zero an axis that sits inside the deadzone.
pub fn apply_deadzone(value: f32, threshold: f32) -> f32 {
    if value.abs() < threshold { 0.0 } else { value }
}

/// Convert an input vector to wheel commands with the default deadzone.
///
/// Wheels are indexed [front-left, front-right, rear-left, rear-right],
/// i.e. motor id - 1.
pub fn vector_to_wheels(x: f32, y: f32, r: f32) -> [WheelCommand; 4] {
    vector_to_wheels_with_deadzone(x, y, r, DEADZONE)
}

/// Convert an input vector to wheel commands with a custom deadzone.
pub fn vector_to_wheels_with_deadzone(
    x: f32,
    y: f32,
    r: f32,
    deadzone: f32,
) -> [WheelCommand; 4] {
    let x = apply_deadzone(x, deadzone);
    let y = apply_deadzone(y, deadzone);
    let r = apply_deadzone(r, deadzone);

    // front-left, front-right, rear-left, rear-right
    let raw = [y + x + r, y - x - r, y - x + r, y + x - r];

    // The 1.0 floor keeps weak inputs from being amplified to full duty.
    let max_value = raw.iter().fold(1.0f32, |acc, v| acc.max(v.abs()));
    let scale = MAX_DUTY_CYCLE / max_value;

    raw.map(|value| WheelCommand {
        direction: if value >= 0.0 {
            Direction::Forward
        } else {
            Direction::Backward
        },
        duty: (value.abs() * scale).min(MAX_DUTY_CYCLE),
    })
}
