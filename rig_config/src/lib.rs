#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the trackability rig.
//!
//! - `Config` holds rig-wide settings (poll cadence, timeouts, interlock,
//!   recorder, logging, simulator) and is deserialized from TOML.
//! - `SessionFile` describes one test session (targets and curve checkpoints).
//!
//! Both are validated with `validate()` before being mapped to runtime types.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Maximum number of curve checkpoints in one session.
pub const MAX_CURVES: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Poll {
    /// Cadence while a session is bound.
    pub process_interval_ms: u64,
    /// Cadence in manual sampling mode (no session bound).
    pub manual_interval_ms: u64,
}

impl Default for Poll {
    fn default() -> Self {
        Self {
            process_interval_ms: 1500,
            manual_interval_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Max wait for one sensor read (ms). Also accepts alias "sensor_ms".
    #[serde(alias = "sensor_ms")]
    pub read_ms: u64,
    /// Max wait for one device command (ms).
    pub command_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read_ms: 1000,
            command_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Tolerance {
    /// Allowed difference in whole millimetres when comparing rounded distances
    /// against the insertion target or zero. 0 means exact rounded equality.
    pub distance_mm: u32,
    /// `truncate` (default) or `nearest`.
    pub rounding: DistanceRounding,
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DistanceRounding {
    #[default]
    Truncate,
    Nearest,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Interlock {
    pub enabled: bool,
    /// A run pauses once temperature falls below `target - drop_hysteresis_c`.
    pub drop_hysteresis_c: f64,
}

impl Default for Interlock {
    fn default() -> Self {
        Self {
            enabled: true,
            drop_hysteresis_c: 0.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Recorder {
    /// Directory for per-run CSV logs.
    pub dir: String,
    /// Also record samples produced while the device was unreachable.
    pub record_simulated: bool,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            dir: "runs".to_string(),
            record_simulated: false,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Parameters of the built-in simulated device controller.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Simulator {
    /// Actuator travel per read while moving.
    pub step_mm: f64,
    /// Bath temperature gain per read while the heater is on.
    pub heat_step_c: f64,
    /// Bath temperature loss per read while the heater is off.
    pub cool_step_c: f64,
    pub ambient_c: f64,
    pub start_temperature_c: f64,
    /// Simulated friction force per millimetre of insertion.
    pub force_per_mm: f64,
}

impl Default for Simulator {
    fn default() -> Self {
        Self {
            step_mm: 25.0,
            heat_step_c: 0.5,
            cool_step_c: 0.05,
            ambient_c: 22.0,
            start_temperature_c: 22.0,
            force_per_mm: 4.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub poll: Poll,
    pub timeouts: Timeouts,
    pub tolerance: Tolerance,
    pub interlock: Interlock,
    pub recorder: Recorder,
    pub logging: Logging,
    pub simulator: Simulator,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Poll
        if self.poll.process_interval_ms == 0 {
            eyre::bail!("poll.process_interval_ms must be >= 1");
        }
        if self.poll.manual_interval_ms == 0 {
            eyre::bail!("poll.manual_interval_ms must be >= 1");
        }
        if self.poll.process_interval_ms > 60 * 1000 {
            eyre::bail!("poll.process_interval_ms is unreasonably large (>60s)");
        }

        // Timeouts: a stalled device must not outlive one poll period
        if self.timeouts.read_ms == 0 {
            eyre::bail!("timeouts.read_ms must be >= 1");
        }
        if self.timeouts.command_ms == 0 {
            eyre::bail!("timeouts.command_ms must be >= 1");
        }
        if self.timeouts.read_ms > self.poll.process_interval_ms {
            eyre::bail!("timeouts.read_ms must be <= poll.process_interval_ms");
        }
        if self.timeouts.command_ms > self.poll.process_interval_ms {
            eyre::bail!("timeouts.command_ms must be <= poll.process_interval_ms");
        }

        // Tolerance
        if self.tolerance.distance_mm > 10 {
            eyre::bail!("tolerance.distance_mm must be in [0, 10]");
        }

        // Interlock
        let h = self.interlock.drop_hysteresis_c;
        if !h.is_finite() || h < 0.0 {
            eyre::bail!("interlock.drop_hysteresis_c must be finite and >= 0.0");
        }

        // Recorder
        if self.recorder.dir.trim().is_empty() {
            eyre::bail!("recorder.dir must not be empty");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Simulator
        let sim = &self.simulator;
        if !(sim.step_mm.is_finite() && sim.step_mm > 0.0) {
            eyre::bail!("simulator.step_mm must be > 0");
        }
        if !(sim.heat_step_c.is_finite() && sim.heat_step_c > 0.0) {
            eyre::bail!("simulator.heat_step_c must be > 0");
        }
        if !(sim.cool_step_c.is_finite() && sim.cool_step_c >= 0.0) {
            eyre::bail!("simulator.cool_step_c must be >= 0");
        }
        if !sim.ambient_c.is_finite() || !sim.start_temperature_c.is_finite() {
            eyre::bail!("simulator temperatures must be finite");
        }
        if !(sim.force_per_mm.is_finite() && sim.force_per_mm >= 0.0) {
            eyre::bail!("simulator.force_per_mm must be >= 0");
        }

        Ok(())
    }
}

/// One named checkpoint along the insertion path.
#[derive(Debug, Deserialize, Clone)]
pub struct CurveEntry {
    pub label: String,
    pub distance_mm: f64,
}

/// Test session schema.
///
/// Example:
/// ```toml
/// name = "6F guide, tortuous path"
/// target_distance_mm = 500.0
/// force_threshold_mn = 2000.0
/// target_temperature_c = 37.0
/// retraction_stroke_mm = 500.0
///
/// [[curves]]
/// label = "aortic arch"
/// distance_mm = 120.0
/// ```
#[derive(Debug, Deserialize, Clone)]
pub struct SessionFile {
    pub name: String,
    pub target_distance_mm: f64,
    pub force_threshold_mn: f64,
    pub target_temperature_c: f64,
    /// Defaults to the insertion target when absent.
    #[serde(default)]
    pub retraction_stroke_mm: Option<f64>,
    #[serde(default)]
    pub curves: Vec<CurveEntry>,
}

pub fn load_session_toml(s: &str) -> Result<SessionFile, toml::de::Error> {
    toml::from_str::<SessionFile>(s)
}

/// Read, parse and validate a session file.
pub fn load_session_file(path: &Path) -> eyre::Result<SessionFile> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read session file {:?}: {}", path, e))?;
    let session =
        load_session_toml(&text).map_err(|e| eyre::eyre!("parse session {:?}: {}", path, e))?;
    session.validate()?;
    Ok(session)
}

impl SessionFile {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.name.trim().is_empty() {
            eyre::bail!("session.name must not be empty");
        }
        if !(self.target_distance_mm.is_finite() && self.target_distance_mm > 0.0) {
            eyre::bail!("session.target_distance_mm must be > 0");
        }
        if !(self.force_threshold_mn.is_finite() && self.force_threshold_mn > 0.0) {
            eyre::bail!("session.force_threshold_mn must be > 0");
        }
        if !self.target_temperature_c.is_finite() {
            eyre::bail!("session.target_temperature_c must be finite");
        }
        if let Some(stroke) = self.retraction_stroke_mm
            && !(stroke.is_finite() && stroke > 0.0)
        {
            eyre::bail!("session.retraction_stroke_mm must be > 0");
        }
        if self.curves.len() > MAX_CURVES {
            eyre::bail!(
                "session.curves has {} entries; at most {} are allowed",
                self.curves.len(),
                MAX_CURVES
            );
        }
        let mut seen = HashSet::new();
        for (idx, c) in self.curves.iter().enumerate() {
            if c.label.trim().is_empty() {
                eyre::bail!("session.curves[{idx}].label must not be empty");
            }
            if !seen.insert(c.label.as_str()) {
                eyre::bail!("session.curves[{idx}].label {:?} is duplicated", c.label);
            }
            if !c.distance_mm.is_finite() {
                eyre::bail!("session.curves[{idx}].distance_mm must be finite");
            }
        }
        Ok(())
    }

    /// Labels of curves that can never fire because they lie outside (0, target].
    pub fn unreachable_curves(&self) -> Vec<&str> {
        self.curves
            .iter()
            .filter(|c| c.distance_mm <= 0.0 || c.distance_mm > self.target_distance_mm)
            .map(|c| c.label.as_str())
            .collect()
    }
}
