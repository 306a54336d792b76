//! Flat labels from a merge tree.

use density_map_cluster_models::LinkageTree;

use crate::ClusterError;

/// Labels after applying the first `n - k` merges.
///
/// Labels are dense and numbered by first appearance in row order.
///
/// # Errors
///
/// * [`ClusterError::InvalidClusterCount`] if `k` is not in `1..=n`.
/// * [`ClusterError::MalformedTree`] if the tree is not a valid merge
///   sequence over its leaves.
pub fn cut_tree_clusters(tree: &LinkageTree, k: usize) -> Result<Vec<usize>, ClusterError> {
    let n = tree.n_leaves;
    if k == 0 || k > n {
        return Err(ClusterError::InvalidClusterCount { k, rows: n });
    }
    check_tree(tree)?;
    Ok(apply_merges(tree, n - k))
}

/// Labels after applying every merge at distance `<= threshold`.
///
/// # Errors
///
/// * [`ClusterError::InvalidThreshold`] if `threshold` is NaN.
/// * [`ClusterError::NonMonotonicLinkage`] if the tree has inversions, since
///   the merges below a threshold then do not form a prefix of the tree.
/// * [`ClusterError::MalformedTree`] if the tree is not a valid merge
///   sequence over its leaves.
pub fn cut_tree_distance(tree: &LinkageTree, threshold: f64) -> Result<Vec<usize>, ClusterError> {
    if threshold.is_nan() {
        return Err(ClusterError::InvalidThreshold { value: threshold });
    }
    check_tree(tree)?;
    let inversions = tree.inversions();
    if !inversions.is_empty() {
        return Err(ClusterError::NonMonotonicLinkage {
            inversions: inversions.len(),
        });
    }

    let applied = tree
        .steps
        .iter()
        .take_while(|s| s.distance <= threshold)
        .count();
    Ok(apply_merges(tree, applied))
}

/// Step `i` may only join two distinct, not yet merged nodes below `n + i`,
/// and a tree over `n` leaves holds exactly `n - 1` steps.
fn check_tree(tree: &LinkageTree) -> Result<(), ClusterError> {
    let n = tree.n_leaves;
    let expected = n.saturating_sub(1);
    if tree.steps.len() != expected {
        return Err(ClusterError::MalformedTree {
            step: tree.steps.len().min(expected),
            reason: format!(
                "{n} leaves need {expected} merges, found {}",
                tree.steps.len()
            ),
        });
    }

    let mut merged = vec![false; n + expected];
    for (i, step) in tree.steps.iter().enumerate() {
        let bound = n + i;
        for node in [step.left, step.right] {
            if node >= bound {
                return Err(ClusterError::MalformedTree {
                    step: i,
                    reason: format!("node {node} does not exist before node {bound}"),
                });
            }
            if merged[node] {
                return Err(ClusterError::MalformedTree {
                    step: i,
                    reason: format!("node {node} was already merged"),
                });
            }
        }
        if step.left == step.right {
            return Err(ClusterError::MalformedTree {
                step: i,
                reason: format!("node {} is merged with itself", step.left),
            });
        }
        merged[step.left] = true;
        merged[step.right] = true;
    }
    Ok(())
}

fn apply_merges(tree: &LinkageTree, count: usize) -> Vec<usize> {
    let n = tree.n_leaves;
    let mut parent: Vec<usize> = (0..n + count).collect();

    for (i, step) in tree.steps.iter().take(count).enumerate() {
        parent[step.left] = n + i;
        parent[step.right] = n + i;
    }

    let root = |mut node: usize| {
        while parent[node] != node {
            node = parent[node];
        }
        node
    };

    let mut dense: Vec<Option<usize>> = vec![None; n + count];
    let mut next = 0;
    (0..n)
        .map(|leaf| {
            let r = root(leaf);
            *dense[r].get_or_insert_with(|| {
                next += 1;
                next - 1
            })
        })
        .collect()
}
