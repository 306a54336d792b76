//! Silhouette coefficient.

use std::collections::BTreeMap;

use density_map_cluster::DistanceMatrix;
use density_map_cluster_models::FeatureMatrix;

use crate::QualityError;

/// Mean silhouette over every row of `features` labelled by `labels`.
///
/// Labels need not be dense. Rows in singleton clusters score 0.
///
/// # Errors
///
/// * [`QualityError::SizeMismatch`] if `labels` and the matrix differ in length.
/// * [`QualityError::InsufficientClusters`] if fewer than 2 labels are present.
pub fn silhouette_score(features: &FeatureMatrix, labels: &[usize]) -> Result<f64, QualityError> {
    check_sizes(features.n_rows(), labels)?;
    silhouette_with_distances(&DistanceMatrix::from_features(features), labels)
}

/// Per-row silhouette values.
///
/// # Errors
///
/// Same as [`silhouette_score`].
pub fn silhouette_samples(
    features: &FeatureMatrix,
    labels: &[usize],
) -> Result<Vec<f64>, QualityError> {
    check_sizes(features.n_rows(), labels)?;
    samples(&DistanceMatrix::from_features(features), labels)
}

/// [`silhouette_score`] over precomputed distances.
///
/// # Errors
///
/// Same as [`silhouette_score`].
#[allow(clippy::cast_precision_loss)]
pub fn silhouette_with_distances(
    distances: &DistanceMatrix,
    labels: &[usize],
) -> Result<f64, QualityError> {
    let values = samples(distances, labels)?;
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Ok(mean.clamp(-1.0, 1.0))
}

fn check_sizes(rows: usize, labels: &[usize]) -> Result<(), QualityError> {
    if rows == labels.len() {
        Ok(())
    } else {
        Err(QualityError::SizeMismatch {
            expected: rows,
            found: labels.len(),
        })
    }
}

#[allow(clippy::cast_precision_loss)]
fn samples(distances: &DistanceMatrix, labels: &[usize]) -> Result<Vec<f64>, QualityError> {
    let n = distances.n_points();
    check_sizes(n, labels)?;

    let mut slot_of: BTreeMap<usize, usize> = BTreeMap::new();
    for &label in labels {
        let next = slot_of.len();
        slot_of.entry(label).or_insert(next);
    }
    if slot_of.len() < 2 {
        return Err(QualityError::InsufficientClusters {
            found: slot_of.len(),
        });
    }

    let slots: Vec<usize> = labels.iter().map(|l| slot_of[l]).collect();
    let mut sizes = vec![0usize; slot_of.len()];
    for &s in &slots {
        sizes[s] += 1;
    }

    let values = (0..n)
        .map(|i| {
            let own = slots[i];
            if sizes[own] == 1 {
                return 0.0;
            }

            let mut sums = vec![0.0; sizes.len()];
            for j in (0..n).filter(|&j| j != i) {
                sums[slots[j]] += distances.get(i, j);
            }

            let a = sums[own] / (sizes[own] - 1) as f64;
            let b = sums
                .iter()
                .zip(&sizes)
                .enumerate()
                .filter(|(s, _)| *s != own)
                .map(|(_, (sum, &size))| sum / size as f64)
                .fold(f64::INFINITY, f64::min);

            let denom = a.max(b);
            if denom > 0.0 { (b - a) / denom } else { 0.0 }
        })
        .collect();

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{matrix, villages};

    #[test]
    fn well_separated_groups_score_high() {
        let features = matrix(&[&[0.0, 0.0], &[0.1, 0.1], &[5.0, 5.0], &[5.1, 5.1]]);
        let score = silhouette_score(&features, &[0, 0, 1, 1]).unwrap();
        assert!(score > 0.9);
    }

    #[test]
    fn bad_assignment_scores_negative() {
        let features = matrix(&[&[0.0], &[0.1], &[5.0], &[5.1]]);
        let score = silhouette_score(&features, &[0, 1, 0, 1]).unwrap();
        assert!(score < 0.0);
    }

    #[test]
    fn score_is_bounded() {
        let features = villages();
        let label_sets: [&[usize]; 4] = [
            &[0, 0, 0, 0, 1, 1, 1, 2, 2, 2, 1, 0],
            &[0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1],
            &[3, 3, 7, 7, 3, 3, 7, 7, 9, 9, 9, 9],
            &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        ];
        for labels in label_sets {
            let score = silhouette_score(&features, labels).unwrap();
            assert!((-1.0..=1.0).contains(&score), "score {score} out of bounds");
            for s in silhouette_samples(&features, labels).unwrap() {
                assert!((-1.0..=1.0).contains(&s));
            }
        }
    }

    #[test]
    fn singletons_score_zero() {
        let features = matrix(&[&[0.0], &[1.0], &[50.0]]);
        let samples = silhouette_samples(&features, &[0, 0, 1]).unwrap();
        assert!(samples[2].abs() < f64::EPSILON);
        assert!(samples[0] > 0.9);
    }

    #[test]
    fn sparse_labels_match_dense() {
        let features = villages();
        let dense = silhouette_score(&features, &[0, 0, 0, 0, 1, 1, 1, 2, 2, 2, 1, 0]).unwrap();
        let sparse = silhouette_score(&features, &[5, 5, 5, 5, 9, 9, 9, 2, 2, 2, 9, 5]).unwrap();
        assert!((dense - sparse).abs() < 1e-12);
    }

    #[test]
    fn single_cluster_fails() {
        let err = silhouette_score(&villages(), &[4; 12]).unwrap_err();
        assert_eq!(err, QualityError::InsufficientClusters { found: 1 });
    }

    #[test]
    fn length_mismatch_fails() {
        let err = silhouette_score(&villages(), &[0, 1]).unwrap_err();
        assert_eq!(
            err,
            QualityError::SizeMismatch {
                expected: 12,
                found: 2
            }
        );
    }
}
