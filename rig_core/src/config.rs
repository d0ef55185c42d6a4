//! Runtime configuration for the controller and the poller.

use crate::util::Rounding;
use std::path::PathBuf;
use std::time::Duration;

/// Poll cadence and per-read timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollCfg {
    /// Interval while a session is bound (process polling).
    pub process_interval_ms: u64,
    /// Interval while no session is bound (manual sampling).
    pub manual_interval_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for PollCfg {
    fn default() -> Self {
        Self {
            process_interval_ms: 1500,
            manual_interval_ms: 500,
            read_timeout_ms: 1000,
        }
    }
}

impl PollCfg {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Temperature interlock settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterlockCfg {
    /// When false, Start is never gated on temperature and drops never pause.
    pub enabled: bool,
    /// A run pauses once temperature falls below `target - drop_hysteresis_c`.
    pub drop_hysteresis_c: f64,
}

impl Default for InterlockCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            drop_hysteresis_c: 0.0,
        }
    }
}

/// Settings of the process controller itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerCfg {
    /// Whole-millimetre tolerance for "target reached" and "back at zero".
    pub tolerance_mm: u32,
    /// How readings are reduced to whole millimetres before comparing.
    pub rounding: Rounding,
    pub command_timeout_ms: u64,
    pub interlock: InterlockCfg,
    /// Also record placeholder samples while the device is unreachable.
    pub record_simulated: bool,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            tolerance_mm: 0,
            rounding: Rounding::Truncate,
            command_timeout_ms: 1000,
            interlock: InterlockCfg::default(),
            record_simulated: false,
        }
    }
}

impl ControllerCfg {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Where per-run CSV logs go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderCfg {
    pub dir: PathBuf,
}

impl Default for RecorderCfg {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("runs"),
        }
    }
}
