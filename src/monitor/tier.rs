//! Air-quality status tiers
//!
//! A reading falls into exactly one tier. Boundaries are inclusive on the lower
//! tier: 1000 ppm is still SAFE and 2000 ppm is still WARNING.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound (inclusive) of the SAFE tier, in ppm
pub const SAFE_MAX_PPM: f64 = 1000.0;
/// Upper bound (inclusive) of the WARNING tier, in ppm
pub const WARNING_MAX_PPM: f64 = 2000.0;

/// Air-quality tier, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusTier {
    Safe,
    Warning,
    Danger,
}

impl StatusTier {
    /// Upper-case label used in notification text
    pub fn label(&self) -> &'static str {
        match self {
            StatusTier::Safe => "SAFE",
            StatusTier::Warning => "WARNING",
            StatusTier::Danger => "DANGER",
        }
    }

    /// Short human description for display layers
    pub fn description(&self) -> &'static str {
        match self {
            StatusTier::Safe => "Safe",
            StatusTier::Warning => "Attention",
            StatusTier::Danger => "Danger",
        }
    }
}

impl fmt::Display for StatusTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a concentration to its tier.
///
/// Callers are expected to have rejected non-finite values; NaN falls through
/// to DANGER rather than being silently treated as safe.
pub fn classify(value: f64) -> StatusTier {
    if value <= SAFE_MAX_PPM {
        StatusTier::Safe
    } else if value <= WARNING_MAX_PPM {
        StatusTier::Warning
    } else {
        StatusTier::Danger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_are_inclusive_on_lower_tier() {
        assert_eq!(classify(1000.0), StatusTier::Safe);
        assert_eq!(classify(1000.01), StatusTier::Warning);
        assert_eq!(classify(2000.0), StatusTier::Warning);
        assert_eq!(classify(2000.01), StatusTier::Danger);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(classify(0.0), StatusTier::Safe);
        assert_eq!(classify(-50.0), StatusTier::Safe);
        assert_eq!(classify(1.0e9), StatusTier::Danger);
    }

    #[test]
    fn test_tiers_are_ordered_by_severity() {
        assert!(StatusTier::Safe < StatusTier::Warning);
        assert!(StatusTier::Warning < StatusTier::Danger);
    }

    #[test]
    fn test_labels() {
        assert_eq!(StatusTier::Safe.to_string(), "SAFE");
        assert_eq!(StatusTier::Warning.label(), "WARNING");
        assert_eq!(StatusTier::Danger.description(), "Danger");
    }

    #[test]
    fn test_serializes_as_label() {
        let json = serde_json::to_string(&StatusTier::Warning).unwrap();
        assert_eq!(json, "\"WARNING\"");
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn classify_is_monotonic(a in -1.0e6f64..1.0e6, b in -1.0e6f64..1.0e6) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(classify(lo) <= classify(hi));
        }
    }
}
