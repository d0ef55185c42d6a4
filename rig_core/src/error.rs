use crate::status::Phase;
use thiserror::Error;

/// Device and infrastructure failures surfaced by the rig.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RigError {
    #[error("device unreachable: {0}")]
    Connectivity(String),
    #[error("timeout waiting for device")]
    Timeout,
    #[error("malformed device data: {0}")]
    Protocol(String),
    #[error("device fault: {0}")]
    DeviceFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("recorder error: {0}")]
    Recorder(String),
    #[error("invalid state: {0}")]
    State(String),
}

/// Why a user command was declined. A declined command changes nothing.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("no configuration bound")]
    NoSessionBound,
    #[error("heating required")]
    HeatingRequired,
    #[error("homing in progress")]
    Homing,
    #[error("device disconnected")]
    DeviceDisconnected,
    #[error("retraction not enabled")]
    RetractNotEnabled,
    #[error("not accepted while {0}")]
    InvalidPhase(Phase),
    #[error("a run is in progress")]
    RunActive,
    #[error("heater command already in flight")]
    HeaterBusy,
    #[error("session has more than {max} curves", max = rig_config::MAX_CURVES)]
    TooManyCurves,
}

impl RejectReason {
    /// Stable machine-readable code, used in JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::NoSessionBound => "no_session_bound",
            RejectReason::HeatingRequired => "heating_required",
            RejectReason::Homing => "homing",
            RejectReason::DeviceDisconnected => "device_disconnected",
            RejectReason::RetractNotEnabled => "retract_not_enabled",
            RejectReason::InvalidPhase(_) => "invalid_phase",
            RejectReason::RunActive => "run_active",
            RejectReason::HeaterBusy => "heater_busy",
            RejectReason::TooManyCurves => "too_many_curves",
        }
    }
}

/// Outcome of a command that did not go through.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("command declined: {0}")]
    Rejected(#[from] RejectReason),
    #[error("device command failed: {0}")]
    Device(#[from] RigError),
    #[error("controller is not running")]
    Stopped,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing device link")]
    MissingLink,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
