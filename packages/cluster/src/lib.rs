#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Clustering engine.
//!
//! Two families of algorithms over a [`FeatureMatrix`]:
//!
//! * [`partition_cluster`]: seeded k-means from `linfa-clustering`
//!   (k-means++ restarts, warm starts chained across cluster counts).
//! * [`hierarchical_cluster`]: agglomerative clustering with Lance-Williams
//!   distance updates, cut into flat labels by [`cut_tree_clusters`] or
//!   [`cut_tree_distance`].

pub mod cut;
pub mod distance;
pub mod hierarchical;
pub mod partition;

use std::str::FromStr as _;

use density_map_cluster_models::{FeatureMatrix, LinkageMethod};

pub use cut::{cut_tree_clusters, cut_tree_distance};
pub use distance::DistanceMatrix;
pub use hierarchical::{hierarchical_cluster, hierarchical_from_distances};
pub use partition::{
    DEFAULT_MAX_ITER, DEFAULT_N_INIT, PartitionConfig, PartitionResult, partition_cluster,
    partition_cluster_with, partition_from_centroids, partition_sweep, total_scatter,
};

/// Errors that can occur while clustering.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClusterError {
    /// There are not enough rows to cluster.
    #[error("Not enough rows to cluster: {rows}")]
    EmptyInput {
        /// Number of rows supplied.
        rows: usize,
    },

    /// Every column has zero variance.
    #[error("All {rows} rows are identical; clustering is undefined")]
    DegenerateInput {
        /// Number of rows supplied.
        rows: usize,
    },

    /// Unknown linkage method name.
    #[error("Invalid linkage method '{name}' (expected one of single, complete, average, ward)")]
    InvalidLinkage {
        /// Name that failed to parse.
        name: String,
    },

    /// Requested cluster count is outside the supported range.
    #[error("Invalid cluster count {k} for {rows} rows")]
    InvalidClusterCount {
        /// Requested cluster count.
        k: usize,
        /// Number of rows.
        rows: usize,
    },

    /// More clusters than rows were requested.
    #[error("Cannot form {k} clusters from {rows} rows")]
    TooManyClusters {
        /// Requested cluster count.
        k: usize,
        /// Number of rows.
        rows: usize,
    },

    /// A distance cut was requested on a tree whose merge distances decrease.
    #[error("Linkage tree has {inversions} inversions; cut by cluster count instead")]
    NonMonotonicLinkage {
        /// Number of inverted steps.
        inversions: usize,
    },

    /// Distance threshold is NaN.
    #[error("Invalid distance threshold: {value}")]
    InvalidThreshold {
        /// Supplied threshold.
        value: f64,
    },

    /// Warm-start centroids do not match the feature width.
    #[error("Initial centroid {index} has {found} values, expected {expected}")]
    CentroidWidth {
        /// Offending centroid.
        index: usize,
        /// Feature column count.
        expected: usize,
        /// Centroid width.
        found: usize,
    },

    /// A linkage tree references clusters that do not exist yet, or has
    /// too few steps for the requested cut.
    #[error("Malformed linkage tree at step {step}: {reason}")]
    MalformedTree {
        /// Index of the offending step.
        step: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// The k-means backend rejected the fit.
    #[error("k-means failed: {message}")]
    Backend {
        /// Backend error message.
        message: String,
    },
}

/// Parses a linkage method name, case-insensitively.
///
/// # Errors
///
/// Returns [`ClusterError::InvalidLinkage`] if `name` is not a known method.
pub fn parse_linkage(name: &str) -> Result<LinkageMethod, ClusterError> {
    LinkageMethod::from_str(name.trim()).map_err(|_| ClusterError::InvalidLinkage {
        name: name.to_string(),
    })
}

/// Rejects matrices that no algorithm can split.
pub(crate) fn ensure_not_degenerate(features: &FeatureMatrix) -> Result<(), ClusterError> {
    if features.is_constant() {
        log::warn!("Refusing to cluster {} identical rows", features.n_rows());
        return Err(ClusterError::DegenerateInput {
            rows: features.n_rows(),
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use density_map_cluster_models::{FeatureColumn, FeatureMatrix};

    pub fn matrix(rows: &[&[f64]]) -> FeatureMatrix {
        let width = rows.first().map_or(0, |r| r.len());
        let columns = (0..width)
            .map(|i| FeatureColumn::Year(2011 + i32::try_from(i).unwrap()))
            .collect();
        FeatureMatrix::new(
            (0..rows.len()).map(|i| format!("A{i}")).collect(),
            columns,
            rows.iter().map(|r| r.to_vec()).collect(),
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_linkage_names() {
        assert_eq!(parse_linkage("ward").unwrap(), LinkageMethod::Ward);
        assert_eq!(parse_linkage(" AVERAGE ").unwrap(), LinkageMethod::Average);
    }

    #[test]
    fn unknown_linkage_fails() {
        let err = parse_linkage("centroid").unwrap_err();
        assert_eq!(
            err,
            ClusterError::InvalidLinkage {
                name: "centroid".to_string()
            }
        );
    }
}
