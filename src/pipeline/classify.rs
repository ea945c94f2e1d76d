//! Score → tier classification.
//!
//! Thresholds are data, not constants buried in presentation code, so tests
//! and callers can move them. Anything visual (colours, the celebration on a
//! low score) belongs to the front-end; a tier only carries its label.

use crate::error::GuardError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl RiskTier {
    pub fn label(self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Moderate => "MODERATE",
            RiskTier::High => "HIGH",
        }
    }

    /// Conventional terminal colour for the tier, as a plain name.
    pub fn color_name(self) -> &'static str {
        match self {
            RiskTier::Low => "green",
            RiskTier::Moderate => "yellow",
            RiskTier::High => "red",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive lower bounds of the MODERATE and HIGH tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Lowest MODERATE score. Default: 4.
    pub moderate_min: u8,
    /// Lowest HIGH score. Default: 7.
    pub high_min: u8,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            moderate_min: 4,
            high_min: 7,
        }
    }
}

impl RiskThresholds {
    /// Require `1 <= moderate_min <= high_min <= 10`.
    pub fn validate(&self) -> Result<(), GuardError> {
        if self.moderate_min < 1 || self.high_min > 10 || self.moderate_min > self.high_min {
            return Err(GuardError::InvalidConfig(format!(
                "Risk thresholds must satisfy 1 ≤ moderate ({}) ≤ high ({}) ≤ 10",
                self.moderate_min, self.high_min
            )));
        }
        Ok(())
    }

    pub fn classify(&self, score: u8) -> RiskTier {
        if score >= self.high_min {
            RiskTier::High
        } else if score >= self.moderate_min {
            RiskTier::Moderate
        } else {
            RiskTier::Low
        }
    }
}

/// Classify with the default thresholds.
pub fn classify(score: u8) -> RiskTier {
    RiskThresholds::default().classify(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn boundaries() {
        assert_eq!(classify(1), RiskTier::Low);
        assert_eq!(classify(3), RiskTier::Low);
        assert_eq!(classify(4), RiskTier::Moderate);
        assert_eq!(classify(6), RiskTier::Moderate);
        assert_eq!(classify(7), RiskTier::High);
        assert_eq!(classify(10), RiskTier::High);
    }

    #[test]
    fn custom_thresholds_move_the_cut() {
        let strict = RiskThresholds {
            moderate_min: 2,
            high_min: 5,
        };
        assert_eq!(strict.classify(1), RiskTier::Low);
        assert_eq!(strict.classify(2), RiskTier::Moderate);
        assert_eq!(strict.classify(5), RiskTier::High);
    }

    #[test]
    fn validate_rejects_bad_ranges() {
        assert!(RiskThresholds::default().validate().is_ok());
        assert!(RiskThresholds { moderate_min: 0, high_min: 7 }.validate().is_err());
        assert!(RiskThresholds { moderate_min: 4, high_min: 11 }.validate().is_err());
        assert!(RiskThresholds { moderate_min: 8, high_min: 7 }.validate().is_err());
        assert!(RiskThresholds { moderate_min: 5, high_min: 5 }.validate().is_ok());
    }

    #[test]
    fn tier_serialises_uppercase() {
        assert_eq!(serde_json::to_string(&RiskTier::Moderate).unwrap(), "\"MODERATE\"");
        assert_eq!(RiskTier::High.to_string(), "HIGH");
        assert_eq!(RiskTier::High.color_name(), "red");
    }

    proptest! {
        #[test]
        fn classification_is_exhaustive_over_clamped_range(score in 1u8..=10) {
            let tier = classify(score);
            prop_assert_eq!(tier == RiskTier::High, score >= 7);
            prop_assert_eq!(tier == RiskTier::Moderate, (4..7).contains(&score));
            prop_assert_eq!(tier == RiskTier::Low, score < 4);
        }

        #[test]
        fn classification_is_monotonic(a in 1u8..=10, b in 1u8..=10) {
            if a <= b {
                prop_assert!(classify(a) <= classify(b));
            }
        }
    }
}
