//! Cophenetic correlation of a linkage tree.

use density_map_cluster::DistanceMatrix;
use density_map_cluster_models::LinkageTree;

use crate::QualityError;

/// Merge distance at which every pair of leaves first shares a cluster.
///
/// # Errors
///
/// Returns [`QualityError::SizeMismatch`] if the tree does not hold
/// `n_leaves - 1` steps.
pub fn cophenetic_distances(tree: &LinkageTree) -> Result<DistanceMatrix, QualityError> {
    let n = tree.n_leaves;
    if tree.steps.len() + 1 != n.max(1) {
        return Err(QualityError::SizeMismatch {
            expected: n.saturating_sub(1),
            found: tree.steps.len(),
        });
    }

    let mut square = vec![0.0; n * n];
    let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();

    for step in &tree.steps {
        let (Some(left), Some(right)) = (members.get(step.left), members.get(step.right)) else {
            return Err(QualityError::SizeMismatch {
                expected: members.len(),
                found: step.left.max(step.right) + 1,
            });
        };
        for &p in left {
            for &q in right {
                square[p * n + q] = step.distance;
                square[q * n + p] = step.distance;
            }
        }
        let merged: Vec<usize> = left.iter().chain(right).copied().collect();
        members.push(merged);
    }

    let mut condensed = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            condensed.push(square[i * n + j]);
        }
    }

    DistanceMatrix::from_condensed(n, condensed).ok_or(QualityError::SizeMismatch {
        expected: n,
        found: n,
    })
}

/// Pearson correlation between the tree's cophenetic distances and the
/// original pairwise distances, clamped to `[-1, 1]`.
///
/// # Errors
///
/// * [`QualityError::SizeMismatch`] if the tree and `distances` cover a
///   different number of rows.
/// * [`QualityError::UndefinedCorrelation`] if either vector is constant.
#[allow(clippy::cast_precision_loss)]
pub fn cophenetic_correlation(
    tree: &LinkageTree,
    distances: &DistanceMatrix,
) -> Result<f64, QualityError> {
    if tree.n_leaves != distances.n_points() {
        return Err(QualityError::SizeMismatch {
            expected: tree.n_leaves,
            found: distances.n_points(),
        });
    }

    let coph = cophenetic_distances(tree)?;
    let x = coph.condensed();
    let y = distances.condensed();
    if x.is_empty() {
        return Err(QualityError::UndefinedCorrelation);
    }

    let len = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / len;
    let mean_y = y.iter().sum::<f64>() / len;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return Err(QualityError::UndefinedCorrelation);
    }

    Ok((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}
