// Timeouts, topics, pin layout, movement profile defaults
use std::time::Duration;

use crate::motor::MotorPins;

// Runtime/teleop loop frequency
pub const LOOP_HZ: u64 = 60;

// Teleop input staleness timeout for the watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "mecanum/cmd/drive"; // commands
pub const TOPIC_HEALTH: &str = "mecanum/state/health"; // health status

// PWM carrier frequency on the enable lines
pub const PWM_FREQUENCY_HZ: u32 = 1000;

// Movement profile defaults: ramps start here, step every RAMP_STEP_DELAY,
// and the robot holds max speed for MOVE_RUN_TIME
pub const STARTUP_SPEED: f32 = 10.0;
pub const RAMP_STEP_DELAY: Duration = Duration::from_millis(20);
pub const MOVE_RUN_TIME: Duration = Duration::from_secs(1);

// Wiring (BCM numbering), one row per motor id 1..=4:
// front-left, front-right, rear-left, rear-right.
// Motor 2 is mounted mirrored, so its direction sense is reversed.
pub const MOTOR_LAYOUT: [MotorPins; 4] = [
    MotorPins {
        enable: 12,
        in1: 5,
        in2: 6,
        reversed: false,
    },
    MotorPins {
        enable: 18,
        in1: 16,
        in2: 20,
        reversed: true,
    },
    MotorPins {
        enable: 13,
        in1: 21,
        in2: 26,
        reversed: false,
    },
    MotorPins {
        enable: 19,
        in1: 23,
        in2: 24,
        reversed: false,
    },
];
