#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Shared clustering types.
//!
//! Defines the numeric [`FeatureMatrix`] every clustering and scoring
//! routine consumes, per-cluster [`Centroid`]s, the hierarchical
//! [`LinkageTree`], and the density category taxonomy assigned to
//! discovered clusters.

pub mod density;
pub mod linkage;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub use density::{DensityCategory, DensityThresholds, InvalidThresholdsError};
pub use linkage::{LinkageMethod, LinkageTree, MergeStep};

/// What a single feature column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    /// Population counts for a year.
    Year(i32),
    /// Centroid latitude.
    Latitude,
    /// Centroid longitude.
    Longitude,
}

impl FeatureColumn {
    /// Whether this column holds population counts.
    #[must_use]
    pub const fn is_population(self) -> bool {
        matches!(self, Self::Year(_))
    }
}

impl std::fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Year(year) => write!(f, "{year}"),
            Self::Latitude => write!(f, "Latitude"),
            Self::Longitude => write!(f, "Longitude"),
        }
    }
}

/// Error returned when a [`FeatureMatrix`] is built from inconsistent parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixShapeError {
    /// The number of area ids does not match the number of rows.
    IdCount {
        /// Number of area ids supplied.
        ids: usize,
        /// Number of rows supplied.
        rows: usize,
    },
    /// A row has the wrong number of values.
    RowWidth {
        /// Offending row index.
        row: usize,
        /// Number of columns declared.
        expected: usize,
        /// Number of values in the row.
        found: usize,
    },
    /// A value is `NaN` or infinite.
    NonFinite {
        /// Offending row index.
        row: usize,
        /// Offending column index.
        column: usize,
    },
}

impl std::fmt::Display for MatrixShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdCount { ids, rows } => {
                write!(f, "{ids} area ids supplied for {rows} feature rows")
            }
            Self::RowWidth {
                row,
                expected,
                found,
            } => write!(f, "row {row} has {found} values, expected {expected}"),
            Self::NonFinite { row, column } => {
                write!(f, "non-finite value at row {row}, column {column}")
            }
        }
    }
}

impl std::error::Error for MatrixShapeError {}

/// Dense numeric feature matrix: one row per area, one column per feature.
///
/// Every value is finite; missing data must be rejected or imputed before
/// a matrix is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureMatrix {
    area_ids: Vec<String>,
    columns: Vec<FeatureColumn>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Builds a matrix, checking that the parts line up.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixShapeError`] if the id count differs from the row
    /// count, a row has the wrong width, or a value is not finite.
    pub fn new(
        area_ids: Vec<String>,
        columns: Vec<FeatureColumn>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, MatrixShapeError> {
        if area_ids.len() != rows.len() {
            return Err(MatrixShapeError::IdCount {
                ids: area_ids.len(),
                rows: rows.len(),
            });
        }

        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(MatrixShapeError::RowWidth {
                    row: i,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
            if let Some(j) = row.iter().position(|v| !v.is_finite()) {
                return Err(MatrixShapeError::NonFinite { row: i, column: j });
            }
        }

        Ok(Self {
            area_ids,
            columns,
            rows,
        })
    }

    /// Number of rows (areas).
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of feature columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Area key of every row, in row order.
    #[must_use]
    pub fn area_ids(&self) -> &[String] {
        &self.area_ids
    }

    /// Column descriptors, in column order.
    #[must_use]
    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// A single row.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[must_use]
    pub fn row(&self, index: usize) -> &[f64] {
        &self.rows[index]
    }

    /// Whether every column holds a single repeated value.
    ///
    /// Clustering is undefined on such a matrix.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_constant(&self) -> bool {
        let Some(first) = self.rows.first() else {
            return true;
        };
        self.rows
            .iter()
            .all(|row| row.iter().zip(first).all(|(a, b)| a == b))
    }

    /// Returns a matrix containing only the columns accepted by `keep`.
    #[must_use]
    pub fn select_columns(&self, keep: impl Fn(FeatureColumn) -> bool) -> Self {
        let indices: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| keep(**c))
            .map(|(i, _)| i)
            .collect();

        Self {
            area_ids: self.area_ids.clone(),
            columns: indices.iter().map(|&i| self.columns[i]).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i]).collect())
                .collect(),
        }
    }
}

/// Mean feature vector of the rows assigned to one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Centroid {
    /// Cluster label.
    pub cluster: usize,
    /// Number of rows in the cluster.
    pub members: usize,
    /// Per-column mean.
    pub values: Vec<f64>,
}

impl Centroid {
    /// Mean of the centroid's values across all of its columns.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_value(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }
}

/// Computes the centroid of every non-empty cluster, ordered by label.
///
/// `labels[i]` is the cluster of `matrix.row(i)`; extra labels or rows
/// beyond the shorter of the two are ignored.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_centroids(matrix: &FeatureMatrix, labels: &[usize]) -> Vec<Centroid> {
    let mut sums: BTreeMap<usize, (Vec<f64>, usize)> = BTreeMap::new();

    for (row, &label) in matrix.rows().iter().zip(labels) {
        let entry = sums
            .entry(label)
            .or_insert_with(|| (vec![0.0; matrix.n_cols()], 0));
        for (acc, v) in entry.0.iter_mut().zip(row) {
            *acc += v;
        }
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(cluster, (values, members))| Centroid {
            cluster,
            members,
            values: values.into_iter().map(|v| v / members as f64).collect(),
        })
        .collect()
}

/// The set of labels actually present.
#[must_use]
pub fn distinct_labels(labels: &[usize]) -> BTreeSet<usize> {
    labels.iter().copied().collect()
}

/// Member count of every label present.
#[must_use]
pub fn cluster_sizes(labels: &[usize]) -> BTreeMap<usize, usize> {
    let mut sizes = BTreeMap::new();
    for &label in labels {
        *sizes.entry(label).or_insert(0) += 1;
    }
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: Vec<Vec<f64>>) -> FeatureMatrix {
        let ids = (0..rows.len()).map(|i| format!("A{i}")).collect();
        let cols = (0..rows.first().map_or(0, Vec::len))
            .map(|i| FeatureColumn::Year(2011 + i32::try_from(i).unwrap()))
            .collect();
        FeatureMatrix::new(ids, cols, rows).unwrap()
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = FeatureMatrix::new(
            vec!["A".into(), "B".into()],
            vec![FeatureColumn::Year(2011), FeatureColumn::Year(2012)],
            vec![vec![1.0, 2.0], vec![3.0]],
        )
        .unwrap_err();
        assert_eq!(
            err,
            MatrixShapeError::RowWidth {
                row: 1,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn rejects_non_finite_values() {
        let err = FeatureMatrix::new(
            vec!["A".into()],
            vec![FeatureColumn::Year(2011)],
            vec![vec![f64::NAN]],
        )
        .unwrap_err();
        assert_eq!(err, MatrixShapeError::NonFinite { row: 0, column: 0 });
    }

    #[test]
    fn constant_detection() {
        assert!(matrix(vec![vec![5.0, 5.0]; 13]).is_constant());
        assert!(!matrix(vec![vec![5.0, 5.0], vec![5.0, 6.0]]).is_constant());
    }

    #[test]
    fn select_population_columns() {
        let m = FeatureMatrix::new(
            vec!["A".into()],
            vec![
                FeatureColumn::Year(2011),
                FeatureColumn::Latitude,
                FeatureColumn::Year(2012),
            ],
            vec![vec![1.0, -6.5, 3.0]],
        )
        .unwrap();
        let years = m.select_columns(FeatureColumn::is_population);
        assert_eq!(
            years.columns(),
            &[FeatureColumn::Year(2011), FeatureColumn::Year(2012)]
        );
        assert_eq!(years.row(0), &[1.0, 3.0]);
    }

    #[test]
    fn centroids_skip_empty_labels() {
        let m = matrix(vec![vec![0.0, 2.0], vec![2.0, 4.0], vec![10.0, 10.0]]);
        let centroids = compute_centroids(&m, &[0, 0, 2]);
        assert_eq!(centroids.len(), 2);
        assert_eq!(centroids[0].cluster, 0);
        assert_eq!(centroids[0].members, 2);
        assert_eq!(centroids[0].values, vec![1.0, 3.0]);
        assert!((centroids[0].mean_value() - 2.0).abs() < 1e-12);
        assert_eq!(centroids[1].cluster, 2);
    }

    #[test]
    fn label_helpers() {
        let labels = [2, 0, 2, 2];
        assert_eq!(distinct_labels(&labels).into_iter().collect::<Vec<_>>(), [0, 2]);
        assert_eq!(cluster_sizes(&labels).get(&2), Some(&3));
    }
}
