//! Pairwise Euclidean distances in condensed form.

use density_map_cluster_models::FeatureMatrix;

/// Squared Euclidean distance between two equally sized vectors.
#[must_use]
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Euclidean distance between two equally sized vectors.
#[must_use]
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

/// Upper triangle of a symmetric distance matrix, row-major: the distance
/// between `i < j` lives at `n*i - i*(i+1)/2 + (j - i - 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// Euclidean distances between every pair of rows.
    #[must_use]
    pub fn from_features(features: &FeatureMatrix) -> Self {
        let rows = features.rows();
        let n = rows.len();
        let mut values = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                values.push(euclidean(&rows[i], &rows[j]));
            }
        }
        Self { n, values }
    }

    /// Wraps an existing condensed vector.
    ///
    /// Returns `None` if `values` does not hold `n*(n-1)/2` entries.
    #[must_use]
    pub fn from_condensed(n: usize, values: Vec<f64>) -> Option<Self> {
        (values.len() == n * n.saturating_sub(1) / 2).then_some(Self { n, values })
    }

    /// Number of points.
    #[must_use]
    pub const fn n_points(&self) -> usize {
        self.n
    }

    /// Condensed distances.
    #[must_use]
    pub fn condensed(&self) -> &[f64] {
        &self.values
    }

    /// Distance between points `i` and `j`; zero on the diagonal.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.n && j < self.n, "index out of bounds");
        if i == j {
            return 0.0;
        }
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        self.values[self.n * i - i * (i + 1) / 2 + (j - i - 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::matrix;

    #[test]
    fn condensed_layout() {
        let m = DistanceMatrix::from_features(&matrix(&[&[0.0, 0.0], &[3.0, 4.0], &[6.0, 8.0]]));
        assert_eq!(m.n_points(), 3);
        assert_eq!(m.condensed(), &[5.0, 10.0, 5.0]);
        assert!((m.get(2, 0) - 10.0).abs() < 1e-12);
        assert!((m.get(1, 2) - 5.0).abs() < 1e-12);
        assert!(m.get(1, 1).abs() < f64::EPSILON);
    }

    #[test]
    fn condensed_size_is_checked() {
        assert!(DistanceMatrix::from_condensed(3, vec![1.0, 2.0]).is_none());
        assert!(DistanceMatrix::from_condensed(3, vec![1.0, 2.0, 3.0]).is_some());
        assert!(DistanceMatrix::from_condensed(1, vec![]).is_some());
    }
}
