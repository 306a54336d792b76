#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Cluster quality diagnostics: the k-means elbow curve, silhouette
//! scores, and cophenetic correlation of linkage trees, plus the sweeps
//! that compute them across cluster counts and linkage methods.

pub mod cophenetic;
pub mod inertia;
pub mod silhouette;
pub mod sweep;

use density_map_cluster::ClusterError;
use density_map_cluster_models::LinkageMethod;
use serde::{Deserialize, Serialize};

pub use cophenetic::{cophenetic_correlation, cophenetic_distances};
pub use inertia::inertia_curve;
pub use silhouette::{silhouette_samples, silhouette_score, silhouette_with_distances};
pub use sweep::{cophenetic_by_method, hierarchical_silhouette_curves, partition_silhouette_curve};

/// Errors that can occur while scoring clusterings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QualityError {
    /// Fewer than two distinct labels.
    #[error("Silhouette needs at least 2 clusters, found {found}")]
    InsufficientClusters {
        /// Distinct labels present.
        found: usize,
    },

    /// Inputs describe different numbers of rows.
    #[error("Size mismatch: expected {expected} rows, found {found}")]
    SizeMismatch {
        /// Row count of the reference input.
        expected: usize,
        /// Row count of the other input.
        found: usize,
    },

    /// One of the correlated vectors has zero variance.
    #[error("Correlation is undefined when either distance vector is constant")]
    UndefinedCorrelation,

    /// The requested k range is empty.
    #[error("Empty cluster count range")]
    EmptyRange,

    /// A clustering run failed.
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// One point of a per-k curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Cluster count.
    pub k: usize,
    /// Score at `k`.
    pub value: f64,
}

/// A per-k curve for one linkage method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCurve {
    /// Linkage method.
    pub method: LinkageMethod,
    /// Points in increasing k.
    pub points: Vec<CurvePoint>,
}

/// A single score for one linkage method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MethodScore {
    /// Linkage method.
    pub method: LinkageMethod,
    /// Score, or `None` where it is undefined.
    pub value: Option<f64>,
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

    /// Three loose groups of villages, two population years each.
    pub fn villages() -> FeatureMatrix {
        matrix(&[
            &[1200.0, 1250.0],
            &[980.0, 1010.0],
            &[1430.0, 1400.0],
            &[1100.0, 1180.0],
            &[8200.0, 8350.0],
            &[7900.0, 8100.0],
            &[8600.0, 8500.0],
            &[30500.0, 31000.0],
            &[29800.0, 30200.0],
            &[31900.0, 32500.0],
            &[15000.0, 15400.0],
            &[2500.0, 2600.0],
        ])
    }
}
