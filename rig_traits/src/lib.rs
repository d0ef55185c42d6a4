pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::time::Duration;

/// Error type crossing the device boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One sample as reported by the device controller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurement {
    pub distance_mm: f64,
    pub force_mn: f64,
    pub temperature_c: f64,
    /// Set by the controller once a reset/home cycle has re-zeroed the position sensor.
    pub homing_done: bool,
}

/// Commands understood by the device controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceCommand {
    /// Drive forward. `resume` continues a paused stroke instead of starting a new one.
    Start {
        target_distance_mm: f64,
        force_threshold_mn: f64,
        resume: bool,
    },
    /// Halt the actuator in place.
    Stop,
    /// Drive backwards by `stroke_mm`.
    Retract { stroke_mm: f64 },
    /// Re-zero the position sensor (homing cycle).
    Reset,
    Heater { on: bool },
    /// Halt everything and release the actuator.
    Disable,
}

impl DeviceCommand {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceCommand::Start { resume: false, .. } => "start",
            DeviceCommand::Start { resume: true, .. } => "resume",
            DeviceCommand::Stop => "stop",
            DeviceCommand::Retract { .. } => "retract",
            DeviceCommand::Reset => "reset",
            DeviceCommand::Heater { on: true } => "heater-on",
            DeviceCommand::Heater { on: false } => "heater-off",
            DeviceCommand::Disable => "disable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
}

/// Boundary to the physical device controller.
///
/// Implementations must honour `timeout` on both calls so a stalled device
/// cannot starve the polling loop.
pub trait DeviceLink {
    fn read_sensors(&mut self, timeout: Duration) -> Result<Measurement, BoxError>;
    fn send_command(&mut self, cmd: DeviceCommand, timeout: Duration) -> Result<(), BoxError>;
    fn check_connection(&mut self) -> ConnectionStatus;
}

impl<L: DeviceLink + ?Sized> DeviceLink for Box<L> {
    fn read_sensors(&mut self, timeout: Duration) -> Result<Measurement, BoxError> {
        (**self).read_sensors(timeout)
    }
    fn send_command(&mut self, cmd: DeviceCommand, timeout: Duration) -> Result<(), BoxError> {
        (**self).send_command(cmd, timeout)
    }
    fn check_connection(&mut self) -> ConnectionStatus {
        (**self).check_connection()
    }
}
