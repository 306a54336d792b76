#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Density classification of clusters.
//!
//! Each cluster's category comes from the mean of its centroid's values
//! compared against caller-supplied [`DensityThresholds`]; every member of
//! a cluster shares the cluster's category.

use std::collections::BTreeMap;

use density_map_cluster_models::Centroid;
use serde::{Deserialize, Serialize};

pub use density_map_cluster_models::{DensityCategory, DensityThresholds, InvalidThresholdsError};

/// Errors that can occur while classifying clusters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DensityError {
    /// A row's label has no centroid.
    #[error("No centroid for cluster {cluster}")]
    MissingCentroid {
        /// Label without a centroid.
        cluster: usize,
    },
}

/// Category assigned to one cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCategory {
    /// Cluster label.
    pub cluster: usize,
    /// Mean of the centroid's values.
    pub centroid_mean: f64,
    /// Assigned category.
    pub category: DensityCategory,
}

/// Categories for every cluster and every row of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    /// One entry per centroid, in centroid order.
    pub clusters: Vec<ClusterCategory>,
    /// Category of every row, in row order.
    pub rows: Vec<DensityCategory>,
}

impl Classification {
    /// Category of `cluster`, if it has a centroid.
    #[must_use]
    pub fn category_of(&self, cluster: usize) -> Option<DensityCategory> {
        self.clusters
            .iter()
            .find(|c| c.cluster == cluster)
            .map(|c| c.category)
    }

    /// Number of rows in each category present.
    #[must_use]
    pub fn row_counts(&self) -> BTreeMap<DensityCategory, usize> {
        let mut counts = BTreeMap::new();
        for &category in &self.rows {
            *counts.entry(category).or_insert(0) += 1;
        }
        counts
    }
}

/// Categorizes every cluster by its centroid mean and propagates the
/// category to the rows labelled with it.
///
/// # Errors
///
/// Returns [`DensityError::MissingCentroid`] if a label in `labels` has no
/// matching centroid.
pub fn classify(
    labels: &[usize],
    centroids: &[Centroid],
    thresholds: &DensityThresholds,
) -> Result<Classification, DensityError> {
    let clusters: Vec<ClusterCategory> = centroids
        .iter()
        .map(|c| {
            let centroid_mean = c.mean_value();
            ClusterCategory {
                cluster: c.cluster,
                centroid_mean,
                category: thresholds.categorize(centroid_mean),
            }
        })
        .collect();

    let by_label: BTreeMap<usize, DensityCategory> =
        clusters.iter().map(|c| (c.cluster, c.category)).collect();

    let rows = labels
        .iter()
        .map(|&cluster| {
            by_label
                .get(&cluster)
                .copied()
                .ok_or(DensityError::MissingCentroid { cluster })
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!(
        "Classified {} clusters with thresholds ({}, {})",
        clusters.len(),
        thresholds.low(),
        thresholds.high()
    );

    Ok(Classification { clusters, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centroid(cluster: usize, values: &[f64]) -> Centroid {
        Centroid {
            cluster,
            members: 1,
            values: values.to_vec(),
        }
    }

    #[test]
    fn mean_above_high_is_very_dense() {
        let result = classify(
            &[0, 0],
            &[centroid(0, &[70_000.0, 80_000.0])],
            &DensityThresholds::PARTITION_DEFAULT,
        )
        .unwrap();
        assert_eq!(result.rows, [DensityCategory::VeryDense; 2]);
        assert!((result.clusters[0].centroid_mean - 75_000.0).abs() < 1e-9);
    }

    #[test]
    fn members_share_their_cluster_category() {
        let centroids = [
            centroid(0, &[5_000.0]),
            centroid(1, &[20_000.0]),
            centroid(2, &[60_000.0]),
        ];
        let labels = [2, 0, 1, 0, 2];
        let result = classify(&labels, &centroids, &DensityThresholds::PARTITION_DEFAULT).unwrap();
        assert_eq!(
            result.rows,
            [
                DensityCategory::VeryDense,
                DensityCategory::NotDense,
                DensityCategory::Dense,
                DensityCategory::NotDense,
                DensityCategory::VeryDense,
            ]
        );
        assert_eq!(result.category_of(1), Some(DensityCategory::Dense));
        assert_eq!(result.category_of(7), None);
        assert_eq!(result.row_counts()[&DensityCategory::NotDense], 2);
    }

    #[test]
    fn category_is_monotonic_in_mean() {
        let thresholds = DensityThresholds::HIERARCHICAL_DEFAULT;
        let centroids: Vec<Centroid> = (0..60)
            .map(|i| centroid(i, &[f64::from(u32::try_from(i).unwrap()) * 12_500.0]))
            .collect();
        let labels: Vec<usize> = (0..60).collect();
        let result = classify(&labels, &centroids, &thresholds).unwrap();
        for pair in result.clusters.windows(2) {
            assert!(pair[0].centroid_mean <= pair[1].centroid_mean);
            assert!(pair[0].category <= pair[1].category);
        }
        assert_eq!(result.rows[0], DensityCategory::NotDense);
        assert_eq!(result.rows[59], DensityCategory::VeryDense);
    }

    #[test]
    fn thresholds_are_caller_configuration() {
        let centroids = [centroid(0, &[75_000.0])];
        let partition = classify(&[0], &centroids, &DensityThresholds::PARTITION_DEFAULT).unwrap();
        let hierarchical =
            classify(&[0], &centroids, &DensityThresholds::HIERARCHICAL_DEFAULT).unwrap();
        assert_eq!(partition.rows[0], DensityCategory::VeryDense);
        assert_eq!(hierarchical.rows[0], DensityCategory::NotDense);
    }

    #[test]
    fn label_without_centroid_fails() {
        let err = classify(&[0, 3], &[centroid(0, &[1.0])], &DensityThresholds::PARTITION_DEFAULT)
            .unwrap_err();
        assert_eq!(err, DensityError::MissingCentroid { cluster: 3 });
    }
}
