// Per-wheel motor driver
//
// Each Motor owns one H-bridge channel: two direction lines plus the PWM
// enable line. Direction inversion for mirrored mountings is corrected here,
// at the single point where logical direction becomes line levels.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::gpio::{DigitalOutput, GpioError, Level, PwmChannel};

/// Duty-cycle ceiling in percent.
pub const MAX_DUTY_CYCLE: f32 = 100.0;

/// Motor ids and their fixed wheel positions.
pub const MOTOR_FRONT_LEFT: u8 = 1;
pub const MOTOR_FRONT_RIGHT: u8 = 2;
pub const MOTOR_REAR_LEFT: u8 = 3;
pub const MOTOR_REAR_RIGHT: u8 = 4;

/// All motor ids, in id order.
pub const ALL_MOTOR_IDS: [u8; 4] = [
    MOTOR_FRONT_LEFT,
    MOTOR_FRONT_RIGHT,
    MOTOR_REAR_LEFT,
    MOTOR_REAR_RIGHT,
];

/// Wiring of one motor: the enable/PWM pin, the H-bridge direction pair, and
/// whether the motor is mounted electrically mirrored.
#[derive(Debug, Clone, Copy)]
pub struct MotorPins {
    pub enable: u8,
    pub in1: u8,
    pub in2: u8,
    pub reversed: bool,
}

/// Logical drive direction, before correcting for mirrored mounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
    Stopped,
}

impl Direction {
    fn mirrored(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
            Direction::Stopped => Direction::Stopped,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Stopped => "stopped",
        };
        write!(f, "{name}")
    }
}

/// One actuator: claimed lines plus the last commanded direction and duty.
pub struct Motor {
    id: u8,
    in1: Box<dyn DigitalOutput>,
    in2: Box<dyn DigitalOutput>,
    pwm: Box<dyn PwmChannel>,
    reversed: bool,
    direction: Direction,
    speed: f32,
}

impl Motor {
    /// Build a motor over already-claimed lines, starting PWM at 0% duty.
    pub(crate) fn new(
        id: u8,
        in1: Box<dyn DigitalOutput>,
        in2: Box<dyn DigitalOutput>,
        mut pwm: Box<dyn PwmChannel>,
        reversed: bool,
    ) -> Result<Self, GpioError> {
        pwm.start(0.0)?;
        Ok(Self {
            id,
            in1,
            in2,
            pwm,
            reversed,
            direction: Direction::Stopped,
            speed: 0.0,
        })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Last commanded logical direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Last commanded duty cycle, already clamped.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Drive the direction pair. A mirrored motor swaps forward/backward
    /// electrically; the recorded direction stays logical.
    pub fn set_direction(&mut self, direction: Direction) -> Result<(), GpioError> {
        let electrical = if self.reversed {
            direction.mirrored()
        } else {
            direction
        };
        let (in1, in2) = match electrical {
            Direction::Forward => (Level::High, Level::Low),
            Direction::Backward => (Level::Low, Level::High),
            Direction::Stopped => (Level::Low, Level::Low),
        };
        self.in1.write(in1)?;
        self.in2.write(in2)?;
        self.direction = direction;
        debug!("motor {} direction set to {direction}", self.id);
        Ok(())
    }

    /// Apply a duty cycle. Out-of-range values are silently clamped to
    /// [0, 100]; real sticks jitter past their nominal range.
    pub fn set_speed(&mut self, duty: f32) -> Result<(), GpioError> {
        let duty = duty.clamp(0.0, MAX_DUTY_CYCLE);
        self.pwm.set_duty_cycle(duty)?;
        self.speed = duty;
        debug!("motor {} speed set to {duty}% duty cycle", self.id);
        Ok(())
    }

    /// Zero the duty cycle and halt carrier generation. Idempotent.
    pub fn stop(&mut self) -> Result<(), GpioError> {
        self.pwm.set_duty_cycle(0.0)?;
        self.pwm.stop()?;
        self.speed = 0.0;
        Ok(())
    }

    /// Teardown: carrier halted, both direction lines low.
    pub(crate) fn release(&mut self) -> Result<(), GpioError> {
        self.stop()?;
        self.in1.write(Level::Low)?;
        self.in2.write(Level::Low)?;
        self.direction = Direction::Stopped;
        Ok(())
    }
}
