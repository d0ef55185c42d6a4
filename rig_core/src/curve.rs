//! Curve threshold tracking: one-shot flags for named distance checkpoints.

use crate::session::Curve;
use crate::util::Rounding;
use serde::Serialize;

/// Reached state of one checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveStatus {
    pub label: String,
    pub distance_mm: f64,
    pub reached: bool,
    /// Run-relative time at which the checkpoint was first crossed.
    pub reached_at_ms: Option<u64>,
}

/// Tracks which checkpoints the current run has passed.
///
/// A flag never goes back from reached to not-reached except through
/// `reset()`. Checkpoints at or below zero never fire.
#[derive(Debug, Clone, Default)]
pub struct CurveThresholdTracker {
    curves: Vec<CurveStatus>,
    rounding: Rounding,
}

impl CurveThresholdTracker {
    pub fn new(curves: &[Curve]) -> Self {
        Self {
            curves: curves
                .iter()
                .map(|c| CurveStatus {
                    label: c.label.clone(),
                    distance_mm: c.distance_mm,
                    reached: false,
                    reached_at_ms: None,
                })
                .collect(),
            rounding: Rounding::default(),
        }
    }

    /// Compare against distances rounded with `rounding` instead of truncated.
    #[must_use]
    pub fn with_rounding(mut self, rounding: Rounding) -> Self {
        self.rounding = rounding;
        self
    }

    /// Mark every checkpoint at or below the rounded distance as reached and
    /// return the ones that became reached on this call.
    pub fn evaluate(&mut self, distance_mm: f64, elapsed_ms: u64) -> Vec<CurveStatus> {
        let d = self.rounding.apply(distance_mm) as f64;
        let mut newly = Vec::new();
        for c in self.curves.iter_mut() {
            if !c.reached && c.distance_mm > 0.0 && d >= c.distance_mm {
                c.reached = true;
                c.reached_at_ms = Some(elapsed_ms);
                newly.push(c.clone());
            }
        }
        newly
    }

    pub fn reset(&mut self) {
        for c in self.curves.iter_mut() {
            c.reached = false;
            c.reached_at_ms = None;
        }
    }

    pub fn is_reached(&self, label: &str) -> Option<bool> {
        self.curves
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.reached)
    }

    pub fn statuses(&self) -> &[CurveStatus] {
        &self.curves
    }

    pub fn reached_count(&self) -> usize {
        self.curves.iter().filter(|c| c.reached).count()
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curves(points: &[(&str, f64)]) -> Vec<Curve> {
        points
            .iter()
            .map(|(l, d)| Curve {
                label: (*l).to_string(),
                distance_mm: *d,
            })
            .collect()
    }

    #[test]
    fn fires_once_on_rounded_distance() {
        let mut t = CurveThresholdTracker::new(&curves(&[("arch", 120.0), ("iliac", 300.0)]));
        assert!(t.evaluate(119.9, 10).is_empty());
        let hit = t.evaluate(120.2, 20);
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].label, "arch");
        assert_eq!(hit[0].reached_at_ms, Some(20));
        assert!(t.evaluate(150.0, 30).is_empty());
        assert_eq!(t.is_reached("iliac"), Some(false));
        assert_eq!(t.is_reached("nope"), None);
    }

    #[test]
    fn nearest_rounding_fires_half_a_millimetre_early() {
        let mut t = CurveThresholdTracker::new(&curves(&[("arch", 120.0)]))
            .with_rounding(Rounding::Nearest);
        assert!(t.evaluate(119.4, 10).is_empty());
        assert_eq!(t.evaluate(119.5, 20).len(), 1);
    }

    #[test]
    fn jump_past_several_checkpoints_fires_all() {
        let mut t = CurveThresholdTracker::new(&curves(&[("a", 10.0), ("b", 20.0), ("c", 90.0)]));
        let hit = t.evaluate(50.0, 0);
        assert_eq!(hit.len(), 2);
        assert_eq!(t.reached_count(), 2);
    }

    #[test]
    fn non_positive_checkpoints_never_fire() {
        let mut t = CurveThresholdTracker::new(&curves(&[("zero", 0.0), ("neg", -5.0)]));
        assert!(t.evaluate(0.0, 0).is_empty());
        assert!(t.evaluate(500.0, 0).is_empty());
    }

    #[test]
    fn reset_clears_every_flag() {
        let mut t = CurveThresholdTracker::new(&curves(&[("a", 10.0)]));
        t.evaluate(10.0, 5);
        t.reset();
        assert_eq!(t.is_reached("a"), Some(false));
        assert_eq!(t.statuses()[0].reached_at_ms, None);
    }
}
