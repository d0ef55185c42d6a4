//! Distance rounding and tolerance helpers.

/// How a distance is reduced to whole millimetres before comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rounding {
    /// Drop the fraction: 499.6 is 499, 500.4 is 500.
    #[default]
    Truncate,
    /// Half away from zero: 499.5 is 500.
    Nearest,
}

impl Rounding {
    /// Whole millimetres, clamped to the i64 range. Non-finite values map to 0.
    #[inline]
    pub fn apply(self, x_mm: f64) -> i64 {
        if !x_mm.is_finite() {
            return 0;
        }
        let r = match self {
            Rounding::Truncate => x_mm.trunc(),
            Rounding::Nearest => x_mm.round(),
        };
        if r >= i64::MAX as f64 {
            i64::MAX
        } else if r <= i64::MIN as f64 {
            i64::MIN
        } else {
            r as i64
        }
    }
}

/// Round to the nearest whole unit, half away from zero.
#[inline]
pub fn round_mm(x_mm: f64) -> i64 {
    Rounding::Nearest.apply(x_mm)
}

/// True when the rounded distances differ by at most `tolerance_mm`.
/// A tolerance of 0 means exact rounded equality.
#[inline]
pub fn within_mm(current_mm: f64, target_mm: f64, tolerance_mm: u32, rounding: Rounding) -> bool {
    rounding
        .apply(current_mm)
        .abs_diff(rounding.apply(target_mm))
        <= u64::from(tolerance_mm)
}
