//! Maps `Box<dyn Error>` from trait boundaries to typed `RigError`.
//!
//! The traits in `rig_traits` use `Box<dyn Error + Send + Sync>` so any
//! transport can plug in; this module converts those to our typed error enum,
//! with an optional feature-gated path for `rig_hardware::HwError` downcasting.

use crate::error::RigError;

/// Map a trait-boundary error to a typed `RigError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> RigError {
    #[cfg(feature = "hardware-errors")]
    {
        use rig_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => RigError::Timeout,
                HwError::Disconnected => RigError::Connectivity(hw.to_string()),
                HwError::Io(io) => RigError::Connectivity(io.to_string()),
                HwError::Protocol(msg) => RigError::Protocol(msg.clone()),
                HwError::Rejected(_) => RigError::DeviceFault(hw.to_string()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        RigError::Timeout
    } else if lower.contains("disconnect") || lower.contains("not connected") {
        RigError::Connectivity(s)
    } else if lower.contains("malformed") || lower.contains("parse") {
        RigError::Protocol(s)
    } else {
        RigError::DeviceFault(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_fallback_classifies_common_messages() {
        let timeout = std::io::Error::other("read timed out");
        assert_eq!(map_hw_error(&timeout), RigError::Timeout);

        let gone = std::io::Error::other("port disconnected");
        assert!(matches!(map_hw_error(&gone), RigError::Connectivity(_)));

        let junk = std::io::Error::other("cannot parse frame");
        assert!(matches!(map_hw_error(&junk), RigError::Protocol(_)));

        let other = std::io::Error::other("overcurrent");
        assert_eq!(
            map_hw_error(&other),
            RigError::DeviceFault("overcurrent".into())
        );
    }
}
