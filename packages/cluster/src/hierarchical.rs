//! Agglomerative clustering with Lance-Williams updates.
//!
//! Slots `0..n` start as singleton clusters. Each step merges the closest
//! pair of active slots into the lower slot and recomputes that slot's
//! distance to every other active slot from the two merged rows of the
//! distance matrix.

use density_map_cluster_models::{FeatureMatrix, LinkageMethod, LinkageTree, MergeStep};

use crate::{ClusterError, DistanceMatrix, ensure_not_degenerate};

/// Builds the full merge tree for `features` under `method`.
///
/// # Errors
///
/// * [`ClusterError::EmptyInput`] if there are fewer than 2 rows.
/// * [`ClusterError::DegenerateInput`] if every row is identical.
pub fn hierarchical_cluster(
    features: &FeatureMatrix,
    method: LinkageMethod,
) -> Result<LinkageTree, ClusterError> {
    if features.n_rows() < 2 {
        return Err(ClusterError::EmptyInput {
            rows: features.n_rows(),
        });
    }
    ensure_not_degenerate(features)?;
    hierarchical_from_distances(&DistanceMatrix::from_features(features), method)
}

/// Builds the merge tree from precomputed Euclidean distances.
///
/// # Errors
///
/// * [`ClusterError::EmptyInput`] if there are fewer than 2 points.
/// * [`ClusterError::DegenerateInput`] if every distance is zero.
#[allow(clippy::float_cmp)]
pub fn hierarchical_from_distances(
    distances: &DistanceMatrix,
    method: LinkageMethod,
) -> Result<LinkageTree, ClusterError> {
    let n = distances.n_points();
    if n < 2 {
        return Err(ClusterError::EmptyInput { rows: n });
    }
    if distances.condensed().iter().all(|d| *d == 0.0) {
        return Err(ClusterError::DegenerateInput { rows: n });
    }

    let mut d = vec![0.0; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let v = distances.get(i, j);
            d[i * n + j] = v;
            d[j * n + i] = v;
        }
    }

    let mut active = vec![true; n];
    let mut size = vec![1usize; n];
    let mut id: Vec<usize> = (0..n).collect();
    let mut steps = Vec::with_capacity(n - 1);

    for step in 0..(n - 1) {
        let (a, b, dist) = closest_pair(&d, &active, n);

        let (na, nb) = (size[a], size[b]);
        for k in (0..n).filter(|&k| active[k] && k != a && k != b) {
            let updated = lance_williams(method, d[a * n + k], d[b * n + k], dist, na, nb, size[k]);
            d[a * n + k] = updated;
            d[k * n + a] = updated;
        }

        steps.push(MergeStep {
            left: id[a].min(id[b]),
            right: id[a].max(id[b]),
            distance: dist,
            size: na + nb,
        });

        active[b] = false;
        size[a] = na + nb;
        id[a] = n + step;
    }

    let tree = LinkageTree {
        method,
        n_leaves: n,
        steps,
    };

    let inversions = tree.inversions();
    if !inversions.is_empty() {
        log::warn!(
            "{method} linkage tree has {} inversions (first at step {})",
            inversions.len(),
            inversions[0]
        );
    }
    log::debug!(
        "Built {method} linkage over {n} rows (max merge distance {:?})",
        tree.max_distance()
    );

    Ok(tree)
}

/// Closest active pair `(a, b, distance)` with `a < b`; the lowest `a`
/// (then lowest `b`) wins ties.
fn closest_pair(d: &[f64], active: &[bool], n: usize) -> (usize, usize, f64) {
    let mut best = (0, 0, f64::INFINITY);
    for a in (0..n).filter(|&a| active[a]) {
        for b in ((a + 1)..n).filter(|&b| active[b]) {
            let v = d[a * n + b];
            if v < best.2 {
                best = (a, b, v);
            }
        }
    }
    best
}

/// Distance from the union of clusters `a` and `b` to cluster `k`.
#[allow(clippy::cast_precision_loss)]
fn lance_williams(
    method: LinkageMethod,
    d_ak: f64,
    d_bk: f64,
    d_ab: f64,
    na: usize,
    nb: usize,
    nk: usize,
) -> f64 {
    let (na, nb, nk) = (na as f64, nb as f64, nk as f64);
    match method {
        LinkageMethod::Single => d_ak.min(d_bk),
        LinkageMethod::Complete => d_ak.max(d_bk),
        LinkageMethod::Average => na.mul_add(d_ak, nb * d_bk) / (na + nb),
        LinkageMethod::Ward => {
            let total = na + nb + nk;
            let squared = (na + nk).mul_add(d_ak * d_ak, (nb + nk) * d_bk * d_bk) - nk * d_ab * d_ab;
            (squared / total).max(0.0).sqrt()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::matrix;

    fn four_points() -> FeatureMatrix {
        matrix(&[&[10.0, 10.0], &[11.0, 11.0], &[1000.0, 1000.0], &[1001.0, 1001.0]])
    }

    #[test]
    fn complete_linkage_merge_order() {
        let tree = hierarchical_cluster(&four_points(), LinkageMethod::Complete).unwrap();
        assert_eq!(tree.n_leaves, 4);
        assert_eq!(tree.steps.len(), 3);

        assert_eq!((tree.steps[0].left, tree.steps[0].right), (0, 1));
        assert_eq!((tree.steps[1].left, tree.steps[1].right), (2, 3));
        assert_eq!((tree.steps[2].left, tree.steps[2].right), (4, 5));
        assert_eq!(tree.steps[2].size, 4);

        let expected = euclid(&[10.0, 10.0], &[1001.0, 1001.0]);
        assert!((tree.steps[2].distance - expected).abs() < 1e-9);
    }

    #[test]
    fn single_and_average_top_merge() {
        let single = hierarchical_cluster(&four_points(), LinkageMethod::Single).unwrap();
        let expected = euclid(&[11.0, 11.0], &[1000.0, 1000.0]);
        assert!((single.steps[2].distance - expected).abs() < 1e-9);

        let average = hierarchical_cluster(&four_points(), LinkageMethod::Average).unwrap();
        let mean = (euclid(&[10.0, 10.0], &[1000.0, 1000.0])
            + euclid(&[10.0, 10.0], &[1001.0, 1001.0])
            + euclid(&[11.0, 11.0], &[1000.0, 1000.0])
            + euclid(&[11.0, 11.0], &[1001.0, 1001.0]))
            / 4.0;
        assert!((average.steps[2].distance - mean).abs() < 1e-9);
    }

    #[test]
    fn ward_matches_variance_increase() {
        // Ward distance between clusters A and B is sqrt(2 |A||B| / (|A|+|B|)) * |mean(A) - mean(B)|.
        let features = matrix(&[&[0.0], &[2.0], &[10.0]]);
        let tree = hierarchical_cluster(&features, LinkageMethod::Ward).unwrap();
        assert!((tree.steps[0].distance - 2.0).abs() < 1e-9);
        let expected = (2.0_f64 * 2.0 * 1.0 / 3.0).sqrt() * 9.0;
        assert!((tree.steps[1].distance - expected).abs() < 1e-9);
    }

    #[test]
    fn every_method_is_monotonic_here() {
        let features = matrix(&[
            &[1.0, 9.0],
            &[2.0, 7.0],
            &[4.0, 4.0],
            &[8.0, 1.0],
            &[9.5, 0.5],
            &[3.0, 3.5],
        ]);
        for &method in LinkageMethod::all() {
            let tree = hierarchical_cluster(&features, method).unwrap();
            assert_eq!(tree.steps.len(), 5);
            assert!(tree.is_monotonic(), "{method} produced inversions");
            assert_eq!(tree.steps.last().unwrap().size, 6);
        }
    }

    #[test]
    fn ties_merge_lowest_slots_first() {
        let features = matrix(&[&[0.0], &[1.0], &[2.0], &[3.0]]);
        let tree = hierarchical_cluster(&features, LinkageMethod::Single).unwrap();
        assert_eq!((tree.steps[0].left, tree.steps[0].right), (0, 1));
        assert_eq!((tree.steps[1].left, tree.steps[1].right), (2, 4));
        assert_eq!((tree.steps[2].left, tree.steps[2].right), (3, 5));
    }

    #[test]
    fn rejects_tiny_and_degenerate_input() {
        assert_eq!(
            hierarchical_cluster(&matrix(&[&[1.0]]), LinkageMethod::Ward).unwrap_err(),
            ClusterError::EmptyInput { rows: 1 }
        );
        let rows: Vec<&[f64]> = vec![&[3.0, 3.0]; 13];
        assert_eq!(
            hierarchical_cluster(&matrix(&rows), LinkageMethod::Average).unwrap_err(),
            ClusterError::DegenerateInput { rows: 13 }
        );
    }

    fn euclid(a: &[f64], b: &[f64]) -> f64 {
        crate::distance::euclidean(a, b)
    }
}
