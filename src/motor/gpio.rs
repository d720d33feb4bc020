// GPIO hardware seam for the drive runtime
//
// The coordination core never toggles pins directly; it talks to these
// traits. A real backend (memory-mapped GPIO on the Pi, an expander, ...)
// implements them. The built-in SimulatedBackend records pin state and duty
// history, backing bench runs and the hardware-level tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

/// Logic level on a digital output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// Error types for the GPIO layer
#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    #[error("pin {pin} is already claimed")]
    PinInUse { pin: u8 },

    #[error("failed to claim pin {pin}: {reason}")]
    Claim { pin: u8, reason: String },

    #[error("write to pin {pin} failed: {reason}")]
    Write { pin: u8, reason: String },
}

pub type Result<T> = std::result::Result<T, GpioError>;

/// One digital output line (a direction input of the H-bridge).
pub trait DigitalOutput: Send {
    fn write(&mut self, level: Level) -> Result<()>;
}

/// One PWM-capable enable line. Duty cycle is a percentage in [0, 100].
pub trait PwmChannel: Send {
    /// Begin generating the carrier at the given duty cycle.
    fn start(&mut self, duty: f32) -> Result<()>;

    /// Change the duty cycle of the channel.
    fn set_duty_cycle(&mut self, duty: f32) -> Result<()>;

    /// Halt carrier generation.
    fn stop(&mut self) -> Result<()>;
}

/// Pin provider. Claiming a pin hands out an exclusive handle; the claim is
/// returned when the handle is dropped.
pub trait GpioBackend: Send {
    fn claim_output(&mut self, pin: u8) -> Result<Box<dyn DigitalOutput>>;

    fn claim_pwm(&mut self, pin: u8, frequency_hz: u32) -> Result<Box<dyn PwmChannel>>;
}

/// Recorded state of one simulated PWM channel.
#[derive(Debug, Clone, Default)]
pub struct PwmSnapshot {
    pub running: bool,
    pub duty: f32,
    pub frequency_hz: u32,
    /// Every duty value ever applied, in order (start + changes).
    pub history: Vec<f32>,
}

#[derive(Debug, Default)]
struct SimState {
    claimed: HashSet<u8>,
    levels: HashMap<u8, Level>,
    pwm: HashMap<u8, PwmSnapshot>,
    failing: HashSet<u8>,
}

impl SimState {
    fn check_writable(&self, pin: u8) -> Result<()> {
        if self.failing.contains(&pin) {
            return Err(GpioError::Write {
                pin,
                reason: "simulated fault".to_string(),
            });
        }
        Ok(())
    }
}

/// In-process GPIO backend. Writes land in a shared state table instead of
/// hardware registers, so callers can inspect what the runtime did.
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Arm or disarm a simulated write fault on `pin`.
    pub fn set_failing(&self, pin: u8, failing: bool) {
        let mut state = self.lock();
        if failing {
            state.failing.insert(pin);
        } else {
            state.failing.remove(&pin);
        }
    }

    pub fn is_claimed(&self, pin: u8) -> bool {
        self.lock().claimed.contains(&pin)
    }

    pub fn level(&self, pin: u8) -> Option<Level> {
        self.lock().levels.get(&pin).copied()
    }

    pub fn pwm_snapshot(&self, pin: u8) -> Option<PwmSnapshot> {
        self.lock().pwm.get(&pin).cloned()
    }

    /// Duty values applied to `pin` so far, oldest first.
    pub fn duty_history(&self, pin: u8) -> Vec<f32> {
        self.lock()
            .pwm
            .get(&pin)
            .map(|p| p.history.clone())
            .unwrap_or_default()
    }

    fn claim(&self, pin: u8) -> Result<Arc<Mutex<SimState>>> {
        let mut state = self.lock();
        if !state.claimed.insert(pin) {
            return Err(GpioError::PinInUse { pin });
        }
        Ok(Arc::clone(&self.state))
    }
}

impl GpioBackend for SimulatedBackend {
    fn claim_output(&mut self, pin: u8) -> Result<Box<dyn DigitalOutput>> {
        let state = self.claim(pin)?;
        state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .levels
            .insert(pin, Level::Low);
        debug!("claimed output pin {pin}");
        Ok(Box::new(SimulatedPin { pin, state }))
    }

    fn claim_pwm(&mut self, pin: u8, frequency_hz: u32) -> Result<Box<dyn PwmChannel>> {
        let state = self.claim(pin)?;
        state.lock().unwrap_or_else(|e| e.into_inner()).pwm.insert(
            pin,
            PwmSnapshot {
                frequency_hz,
                ..PwmSnapshot::default()
            },
        );
        debug!("claimed PWM pin {pin} at {frequency_hz} Hz");
        Ok(Box::new(SimulatedPwm { pin, state }))
    }
}

struct SimulatedPin {
    pin: u8,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPin {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DigitalOutput for SimulatedPin {
    fn write(&mut self, level: Level) -> Result<()> {
        let mut state = self.lock();
        state.check_writable(self.pin)?;
        state.levels.insert(self.pin, level);
        debug!("pin {} -> {:?}", self.pin, level);
        Ok(())
    }
}

impl Drop for SimulatedPin {
    fn drop(&mut self) {
        self.lock().claimed.remove(&self.pin);
    }
}

struct SimulatedPwm {
    pin: u8,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPwm {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn apply(&mut self, duty: f32, running: bool) -> Result<()> {
        let mut state = self.lock();
        state.check_writable(self.pin)?;
        if let Some(pwm) = state.pwm.get_mut(&self.pin) {
            pwm.duty = duty;
            pwm.running = running;
            pwm.history.push(duty);
        }
        Ok(())
    }
}

impl PwmChannel for SimulatedPwm {
    fn start(&mut self, duty: f32) -> Result<()> {
        self.apply(duty, true)?;
        debug!("PWM pin {} started at {duty}%", self.pin);
        Ok(())
    }

    fn set_duty_cycle(&mut self, duty: f32) -> Result<()> {
        self.apply(duty, true)?;
        debug!("PWM pin {} duty -> {duty}%", self.pin);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.check_writable(self.pin)?;
        if let Some(pwm) = state.pwm.get_mut(&self.pin) {
            pwm.running = false;
        }
        debug!("PWM pin {} stopped", self.pin);
        Ok(())
    }
}

impl Drop for SimulatedPwm {
    fn drop(&mut self) {
        let mut state = self.lock();
        if let Some(pwm) = state.pwm.get_mut(&self.pin) {
            pwm.running = false;
        }
        state.claimed.remove(&self.pin);
    }
}
