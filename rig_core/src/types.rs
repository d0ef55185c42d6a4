//! Sensor readings and chart samples.

use crate::util::round_mm;
use rig_traits::Measurement;
use serde::Serialize;

/// Whether a reading came from the device or was synthesized by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Real,
    Simulated,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Real => "real",
            Provenance::Simulated => "simulated",
        }
    }
}

/// One timestamped telemetry point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReading {
    /// Milliseconds since the rig epoch.
    pub timestamp_ms: u64,
    pub distance_mm: f64,
    pub force_mn: f64,
    pub temperature_c: f64,
    pub provenance: Provenance,
}

impl SensorReading {
    pub fn real(timestamp_ms: u64, m: &Measurement) -> Self {
        Self {
            timestamp_ms,
            distance_mm: m.distance_mm,
            force_mn: m.force_mn,
            temperature_c: m.temperature_c,
            provenance: Provenance::Real,
        }
    }

    /// Placeholder emitted while the device is unreachable.
    pub fn simulated(timestamp_ms: u64, m: &Measurement) -> Self {
        Self {
            provenance: Provenance::Simulated,
            ..Self::real(timestamp_ms, m)
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.provenance == Provenance::Simulated
    }

    /// Identity used for de-duplication: rounded distance and force.
    pub fn dedup_key(&self) -> (i64, i64, Provenance) {
        (
            round_mm(self.distance_mm),
            round_mm(self.force_mn),
            self.provenance,
        )
    }
}

/// One point of the live distance/force chart; time is relative to run start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartSample {
    pub elapsed_ms: u64,
    pub distance_mm: f64,
    pub force_mn: f64,
}
