//! Density categories and the cutoffs that assign them.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Qualitative density label of a cluster, ordered from sparsest to densest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum DensityCategory {
    /// Cluster mean below the low cutoff.
    NotDense,
    /// Cluster mean between the cutoffs.
    Dense,
    /// Cluster mean at or above the high cutoff.
    VeryDense,
}

/// Error returned when density cutoffs are unusable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidThresholdsError {
    /// The low cutoff that was provided.
    pub low: f64,
    /// The high cutoff that was provided.
    pub high: f64,
}

impl std::fmt::Display for InvalidThresholdsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid density thresholds (low={}, high={}): expected finite values with low <= high",
            self.low, self.high
        )
    }
}

impl std::error::Error for InvalidThresholdsError {}

#[derive(Deserialize)]
struct RawThresholds {
    low: f64,
    high: f64,
}

impl TryFrom<RawThresholds> for DensityThresholds {
    type Error = InvalidThresholdsError;

    fn try_from(raw: RawThresholds) -> Result<Self, Self::Error> {
        Self::new(raw.low, raw.high)
    }
}

/// The two cutoffs `(low, high)` that split cluster means into categories.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds")]
pub struct DensityThresholds {
    low: f64,
    high: f64,
}

impl DensityThresholds {
    /// Cutoffs used for partition (k-means) clustering runs.
    pub const PARTITION_DEFAULT: Self = Self {
        low: 10_000.0,
        high: 50_000.0,
    };

    /// Cutoffs used for hierarchical clustering runs.
    pub const HIERARCHICAL_DEFAULT: Self = Self {
        low: 100_000.0,
        high: 500_000.0,
    };

    /// Creates a pair of cutoffs.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidThresholdsError`] if either value is not finite or
    /// `low > high`.
    pub fn new(low: f64, high: f64) -> Result<Self, InvalidThresholdsError> {
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(InvalidThresholdsError { low, high });
        }
        Ok(Self { low, high })
    }

    /// The low cutoff.
    #[must_use]
    pub const fn low(&self) -> f64 {
        self.low
    }

    /// The high cutoff.
    #[must_use]
    pub const fn high(&self) -> f64 {
        self.high
    }

    /// Maps a cluster mean to its category.
    #[must_use]
    pub fn categorize(&self, value: f64) -> DensityCategory {
        if value < self.low {
            DensityCategory::NotDense
        } else if value < self.high {
            DensityCategory::Dense
        } else {
            DensityCategory::VeryDense
        }
    }

    /// Bit patterns of both cutoffs, usable as a hash key.
    #[must_use]
    pub const fn key_bits(&self) -> (u64, u64) {
        (self.low.to_bits(), self.high.to_bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorize_boundaries() {
        let t = DensityThresholds::PARTITION_DEFAULT;
        assert_eq!(t.categorize(9_999.0), DensityCategory::NotDense);
        assert_eq!(t.categorize(10_000.0), DensityCategory::Dense);
        assert_eq!(t.categorize(49_999.9), DensityCategory::Dense);
        assert_eq!(t.categorize(50_000.0), DensityCategory::VeryDense);
        assert_eq!(t.categorize(75_000.0), DensityCategory::VeryDense);
    }

    #[test]
    fn rejects_inverted_cutoffs() {
        assert!(DensityThresholds::new(50.0, 10.0).is_err());
        assert!(DensityThresholds::new(f64::NAN, 10.0).is_err());
        assert!(DensityThresholds::new(10.0, 10.0).is_ok());
    }

    #[test]
    fn categories_are_ordered_by_density() {
        assert!(DensityCategory::NotDense < DensityCategory::Dense);
        assert!(DensityCategory::Dense < DensityCategory::VeryDense);
    }
}
