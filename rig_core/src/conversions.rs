//! `From` implementations bridging `rig_config` types to `rig_core` types.

use crate::config::{ControllerCfg, InterlockCfg, PollCfg, RecorderCfg};
use crate::session::{Curve, SessionConfig};
use crate::util::Rounding;

// ── PollCfg ──────────────────────────────────────────────────────────────────

impl From<&rig_config::Config> for PollCfg {
    fn from(c: &rig_config::Config) -> Self {
        Self {
            process_interval_ms: c.poll.process_interval_ms,
            manual_interval_ms: c.poll.manual_interval_ms,
            read_timeout_ms: c.timeouts.read_ms,
        }
    }
}

// ── ControllerCfg ────────────────────────────────────────────────────────────

impl From<rig_config::DistanceRounding> for Rounding {
    fn from(r: rig_config::DistanceRounding) -> Self {
        match r {
            rig_config::DistanceRounding::Truncate => Rounding::Truncate,
            rig_config::DistanceRounding::Nearest => Rounding::Nearest,
        }
    }
}

impl From<&rig_config::Interlock> for InterlockCfg {
    fn from(c: &rig_config::Interlock) -> Self {
        Self {
            enabled: c.enabled,
            drop_hysteresis_c: c.drop_hysteresis_c,
        }
    }
}

impl From<&rig_config::Config> for ControllerCfg {
    fn from(c: &rig_config::Config) -> Self {
        Self {
            tolerance_mm: c.tolerance.distance_mm,
            rounding: c.tolerance.rounding.into(),
            command_timeout_ms: c.timeouts.command_ms,
            interlock: InterlockCfg::from(&c.interlock),
            record_simulated: c.recorder.record_simulated,
        }
    }
}

// ── RecorderCfg ──────────────────────────────────────────────────────────────

impl From<&rig_config::Recorder> for RecorderCfg {
    fn from(c: &rig_config::Recorder) -> Self {
        Self {
            dir: c.dir.clone().into(),
        }
    }
}

// ── SessionConfig ────────────────────────────────────────────────────────────

impl From<&rig_config::SessionFile> for SessionConfig {
    fn from(s: &rig_config::SessionFile) -> Self {
        Self {
            name: s.name.clone(),
            target_distance_mm: s.target_distance_mm,
            force_threshold_mn: s.force_threshold_mn,
            target_temperature_c: s.target_temperature_c,
            retraction_stroke_mm: s.retraction_stroke_mm.unwrap_or(s.target_distance_mm),
            curves: s
                .curves
                .iter()
                .map(|c| Curve {
                    label: c.label.clone(),
                    distance_mm: c.distance_mm,
                })
                .collect(),
        }
    }
}
