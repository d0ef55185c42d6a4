//! Process phases and the notices the controller emits to observers.

use serde::Serialize;

/// Lifecycle of one insertion/retraction test.
///
/// ```text
/// Ready -> Insertion -> InsertionCompleted -> Retraction -> RetractionCompleted -> Ready
///            |   ^                              |   ^
///            v   |                              v   |
///           Paused                        RetractionPaused
/// ```
/// Reset from any phase goes to `Homing`; the homing signal returns to `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Ready,
    Homing,
    Insertion,
    InsertionCompleted,
    Paused,
    Retraction,
    RetractionPaused,
    RetractionCompleted,
}

impl Phase {
    /// Operator-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Ready => "READY",
            Phase::Homing => "HOMING",
            Phase::Insertion => "INSERTION",
            Phase::InsertionCompleted => "INSERTION COMPLETED",
            Phase::Paused => "PAUSED",
            Phase::Retraction => "RETRACTION",
            Phase::RetractionPaused => "RETRACTION PAUSED",
            Phase::RetractionCompleted => "RETRACTION COMPLETED",
        }
    }

    /// The actuator is moving under process control.
    pub fn is_progressing(&self) -> bool {
        matches!(self, Phase::Insertion | Phase::Retraction)
    }

    /// A run has started and not yet finished (or been reset).
    pub fn is_run_active(&self) -> bool {
        matches!(
            self,
            Phase::Insertion
                | Phase::Paused
                | Phase::InsertionCompleted
                | Phase::Retraction
                | Phase::RetractionPaused
        )
    }

    /// Phases in which a new session may be bound.
    pub fn accepts_session(&self) -> bool {
        matches!(
            self,
            Phase::Ready | Phase::Homing | Phase::RetractionCompleted
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Observable events for the operator surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    PhaseChanged {
        from: Phase,
        to: Phase,
    },
    CurveReached {
        label: String,
        distance_mm: f64,
        elapsed_ms: u64,
    },
    Connectivity {
        connected: bool,
    },
    /// Start was declined until the bath reaches temperature.
    HeatingRequired {
        current_c: Option<f64>,
        target_c: f64,
    },
    InterlockSatisfied {
        temperature_c: f64,
    },
    /// Temperature fell below target during a run; the run was paused.
    TemperatureDrop {
        temperature_c: f64,
        target_c: f64,
    },
}
