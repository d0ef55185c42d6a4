//! Runtime session parameters bound to the controller.

/// A named checkpoint along the insertion path.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub label: String,
    pub distance_mm: f64,
}

/// Targets and checkpoints for one test.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub name: String,
    pub target_distance_mm: f64,
    pub force_threshold_mn: f64,
    pub target_temperature_c: f64,
    pub retraction_stroke_mm: f64,
    pub curves: Vec<Curve>,
}

impl SessionConfig {
    /// New session with no curves; the retraction stroke defaults to the
    /// insertion target so retraction ends at zero.
    pub fn new(
        name: impl Into<String>,
        target_distance_mm: f64,
        force_threshold_mn: f64,
        target_temperature_c: f64,
    ) -> Self {
        Self {
            name: name.into(),
            target_distance_mm,
            force_threshold_mn,
            target_temperature_c,
            retraction_stroke_mm: target_distance_mm,
            curves: Vec::new(),
        }
    }

    pub fn with_curve(mut self, label: impl Into<String>, distance_mm: f64) -> Self {
        self.curves.push(Curve {
            label: label.into(),
            distance_mm,
        });
        self
    }

    pub fn with_retraction_stroke(mut self, stroke_mm: f64) -> Self {
        self.retraction_stroke_mm = stroke_mm;
        self
    }
}
