//! Hierarchical linkage criteria and merge trees.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Rule for computing the distance between two clusters while merging.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LinkageMethod {
    /// Minimum pairwise distance.
    Single,
    /// Maximum pairwise distance.
    Complete,
    /// Mean pairwise distance.
    Average,
    /// Merge minimizing the increase in total within-cluster variance.
    Ward,
}

impl LinkageMethod {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Single, Self::Complete, Self::Average, Self::Ward]
    }
}

/// One agglomeration step.
///
/// Cluster ids follow the usual linkage-matrix convention: `0..n` are the
/// original rows and the cluster created by step `i` has id `n + i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStep {
    /// Smaller of the two merged cluster ids.
    pub left: usize,
    /// Larger of the two merged cluster ids.
    pub right: usize,
    /// Inter-cluster distance at which the merge happened.
    pub distance: f64,
    /// Number of original rows in the merged cluster.
    pub size: usize,
}

/// Full agglomeration history over `n_leaves` rows (`n_leaves - 1` steps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkageTree {
    /// Linkage criterion the tree was built with.
    pub method: LinkageMethod,
    /// Number of original rows.
    pub n_leaves: usize,
    /// Merge steps in merge order.
    pub steps: Vec<MergeStep>,
}

/// Relative slack allowed before a decreasing merge distance counts as an
/// inversion (Lance-Williams updates accumulate rounding error).
const INVERSION_TOLERANCE: f64 = 1e-9;

impl LinkageTree {
    /// Indices of steps whose distance is smaller than the previous step's.
    #[must_use]
    pub fn inversions(&self) -> Vec<usize> {
        self.steps
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| {
                let slack = INVERSION_TOLERANCE * pair[0].distance.abs().max(1.0);
                pair[1].distance < pair[0].distance - slack
            })
            .map(|(i, _)| i + 1)
            .collect()
    }

    /// Whether merge distances never decrease.
    #[must_use]
    pub fn is_monotonic(&self) -> bool {
        self.inversions().is_empty()
    }

    /// Smallest merge distance, if any merge happened.
    #[must_use]
    pub fn min_distance(&self) -> Option<f64> {
        self.steps.iter().map(|s| s.distance).reduce(f64::min)
    }

    /// Largest merge distance, if any merge happened.
    #[must_use]
    pub fn max_distance(&self) -> Option<f64> {
        self.steps.iter().map(|s| s.distance).reduce(f64::max)
    }
}
