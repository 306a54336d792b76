//! Seeded k-means on top of `linfa-clustering`.
//!
//! Runs for increasing `k` are chained: every count gets the better of
//! `n_init` seeded k-means++ restarts and a warm start from the previous
//! count's centroids plus the row farthest from them. A run for `k` is
//! therefore never worse than the run for `k - 1`, and the elbow curve can
//! report exactly the inertia a dashboard run produces.

use std::collections::BTreeSet;

use density_map_cluster_models::FeatureMatrix;
use linfa::DatasetBase;
use linfa::traits::Fit as _;
use linfa_clustering::{KMeans, KMeansInit};
use ndarray::Array2;
use rand::SeedableRng as _;
use rand::rngs::StdRng;

use crate::distance::squared_euclidean;
use crate::{ClusterError, ensure_not_degenerate};

/// Iteration cap used when none is configured.
pub const DEFAULT_MAX_ITER: usize = 300;

/// Number of seeded restarts used when none is configured.
pub const DEFAULT_N_INIT: usize = 10;

/// Centroid shift below which a fit stops iterating.
const TOLERANCE: f64 = 1e-4;

/// Parameters for one k-means run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionConfig {
    /// Number of clusters.
    pub k: usize,
    /// Seed for k-means++ initialization.
    pub seed: u64,
    /// Maximum Lloyd iterations per fit.
    pub max_iter: usize,
    /// Seeded restarts per cluster count; the lowest inertia wins.
    pub n_init: usize,
}

impl PartitionConfig {
    /// Config with the default iteration cap and restart count.
    #[must_use]
    pub const fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            seed,
            max_iter: DEFAULT_MAX_ITER,
            n_init: DEFAULT_N_INIT,
        }
    }

    /// Sets the cluster count.
    #[must_use]
    pub const fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Sets the iteration cap.
    #[must_use]
    pub const fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Sets the restart count.
    #[must_use]
    pub const fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }
}

/// Outcome of a k-means run.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionResult {
    /// Cluster of every row, in `0..k`.
    pub labels: Vec<usize>,
    /// Final centroid of every cluster, indexed by label.
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances from each row to its centroid.
    pub inertia: f64,
    /// Whether every non-empty centroid is the mean of its members.
    pub converged: bool,
    /// Labels with no members.
    pub empty_clusters: Vec<usize>,
}

impl PartitionResult {
    /// Number of clusters requested.
    #[must_use]
    pub fn k(&self) -> usize {
        self.centroids.len()
    }
}

/// Runs k-means with `k` clusters seeded by `seed`.
///
/// # Errors
///
/// See [`partition_cluster_with`].
pub fn partition_cluster(
    features: &FeatureMatrix,
    k: usize,
    seed: u64,
) -> Result<PartitionResult, ClusterError> {
    partition_cluster_with(features, &PartitionConfig::new(k, seed))
}

/// Runs k-means for `config.k` clusters.
///
/// # Errors
///
/// * [`ClusterError::EmptyInput`] if the matrix has no rows.
/// * [`ClusterError::InvalidClusterCount`] if `k < 2`.
/// * [`ClusterError::TooManyClusters`] if `k` exceeds the row count.
/// * [`ClusterError::DegenerateInput`] if every row is identical.
/// * [`ClusterError::Backend`] if a fit fails.
pub fn partition_cluster_with(
    features: &FeatureMatrix,
    config: &PartitionConfig,
) -> Result<PartitionResult, ClusterError> {
    let mut sweep = partition_sweep(features, config)?;
    let result = sweep.pop().ok_or(ClusterError::InvalidClusterCount {
        k: config.k,
        rows: features.n_rows(),
    })?;

    if !result.empty_clusters.is_empty() {
        log::warn!(
            "k-means left {} of {} clusters empty: {:?}",
            result.empty_clusters.len(),
            result.k(),
            result.empty_clusters
        );
    }
    log::debug!(
        "k-means k={} seed={} n_init={} converged={} inertia {:.3}",
        config.k,
        config.seed,
        config.n_init,
        result.converged,
        result.inertia
    );
    Ok(result)
}

/// Runs every cluster count from 2 to `config.k`; element `i` is the run
/// for `k = i + 2` and equals [`partition_cluster_with`] at that count.
///
/// # Errors
///
/// Same as [`partition_cluster_with`].
pub fn partition_sweep(
    features: &FeatureMatrix,
    config: &PartitionConfig,
) -> Result<Vec<PartitionResult>, ClusterError> {
    validate(features, config.k)?;

    let records = records(features)?;
    let distinct = distinct_rows(features);
    let mut results: Vec<PartitionResult> = Vec::with_capacity(config.k - 1);

    for k in 2..=config.k {
        // k-means++ cannot place more centroids than there are distinct rows.
        let fresh = if k <= distinct {
            let centroids = fit(
                &records,
                k,
                config,
                config.n_init,
                KMeansInit::KMeansPlusPlus,
            )?;
            Some(finish(features, centroids))
        } else {
            log::debug!("Only {distinct} distinct rows; warm start only for k={k}");
            None
        };

        let warm = match results.last() {
            Some(previous) => {
                let mut initial = previous.centroids.clone();
                initial.push(farthest_row(features, &previous.centroids).to_vec());
                Some(fit_from(features, &records, initial, config)?)
            }
            None => None,
        };

        let best = match (fresh, warm) {
            (Some(fresh), Some(warm)) if warm.inertia < fresh.inertia => warm,
            (Some(run), _) | (None, Some(run)) => run,
            (None, None) => {
                return Err(ClusterError::DegenerateInput {
                    rows: features.n_rows(),
                });
            }
        };
        log::debug!("k-means inertia at k={k}: {:.3}", best.inertia);
        results.push(best);
    }

    Ok(results)
}

/// Runs k-means from caller-supplied centroids.
///
/// # Errors
///
/// Same as [`partition_cluster_with`], plus [`ClusterError::CentroidWidth`]
/// if a centroid does not match the column count.
pub fn partition_from_centroids(
    features: &FeatureMatrix,
    initial: Vec<Vec<f64>>,
    max_iter: usize,
) -> Result<PartitionResult, ClusterError> {
    validate(features, initial.len())?;

    if let Some((index, c)) = initial
        .iter()
        .enumerate()
        .find(|(_, c)| c.len() != features.n_cols())
    {
        return Err(ClusterError::CentroidWidth {
            index,
            expected: features.n_cols(),
            found: c.len(),
        });
    }

    let config = PartitionConfig::new(initial.len(), 0).with_max_iter(max_iter);
    fit_from(features, &records(features)?, initial, &config)
}

/// Sum of squared distances from every row to the global mean (the
/// inertia of a single cluster).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn total_scatter(features: &FeatureMatrix) -> f64 {
    let n = features.n_rows();
    if n == 0 {
        return 0.0;
    }
    let mut mean = vec![0.0; features.n_cols()];
    for row in features.rows() {
        for (m, v) in mean.iter_mut().zip(row) {
            *m += v;
        }
    }
    for m in &mut mean {
        *m /= n as f64;
    }
    features
        .rows()
        .iter()
        .map(|row| squared_euclidean(row, &mean))
        .sum()
}

fn validate(features: &FeatureMatrix, k: usize) -> Result<(), ClusterError> {
    let rows = features.n_rows();
    if rows == 0 {
        return Err(ClusterError::EmptyInput { rows });
    }
    if k < 2 {
        return Err(ClusterError::InvalidClusterCount { k, rows });
    }
    if k > rows {
        return Err(ClusterError::TooManyClusters { k, rows });
    }
    ensure_not_degenerate(features)
}

fn backend(e: impl std::fmt::Display) -> ClusterError {
    ClusterError::Backend {
        message: e.to_string(),
    }
}

fn records(features: &FeatureMatrix) -> Result<Array2<f64>, ClusterError> {
    Array2::from_shape_vec(
        (features.n_rows(), features.n_cols()),
        features.rows().concat(),
    )
    .map_err(backend)
}

fn distinct_rows(features: &FeatureMatrix) -> usize {
    features
        .rows()
        .iter()
        .map(|row| row.iter().copied().map(f64::to_bits).collect::<Vec<_>>())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Fits `k` centroids and returns them by cluster index.
fn fit(
    records: &Array2<f64>,
    k: usize,
    config: &PartitionConfig,
    n_runs: usize,
    init: KMeansInit<f64>,
) -> Result<Vec<Vec<f64>>, ClusterError> {
    let model = KMeans::params_with_rng(k, StdRng::seed_from_u64(config.seed))
        .n_runs(n_runs)
        .max_n_iterations(u64::try_from(config.max_iter).unwrap_or(u64::MAX))
        .tolerance(TOLERANCE)
        .init_method(init)
        .fit(&DatasetBase::from(records.clone()))
        .map_err(backend)?;

    Ok(model
        .centroids()
        .rows()
        .into_iter()
        .map(|row| row.to_vec())
        .collect())
}

fn fit_from(
    features: &FeatureMatrix,
    records: &Array2<f64>,
    initial: Vec<Vec<f64>>,
    config: &PartitionConfig,
) -> Result<PartitionResult, ClusterError> {
    let k = initial.len();
    let init = Array2::from_shape_vec((k, features.n_cols()), initial.concat()).map_err(backend)?;
    let mut centroids = fit(records, k, config, 1, KMeansInit::Precomputed(init))?;

    // A centroid that lost every member keeps its starting position.
    for (centroid, start) in centroids.iter_mut().zip(initial) {
        if centroid.iter().any(|v| !v.is_finite()) {
            *centroid = start;
        }
    }
    Ok(finish(features, centroids))
}

/// Index of the nearest centroid; the lowest index wins ties.
fn nearest_centroid(row: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (j, c) in centroids.iter().enumerate() {
        let d = squared_euclidean(row, c);
        if d < best.1 {
            best = (j, d);
        }
    }
    best
}

/// Assigns every row to the fitted centroids and scores the result.
#[allow(clippy::cast_precision_loss)]
fn finish(features: &FeatureMatrix, centroids: Vec<Vec<f64>>) -> PartitionResult {
    let (labels, inertia) = features.rows().iter().fold(
        (Vec::with_capacity(features.n_rows()), 0.0),
        |(mut labels, inertia), row| {
            let (label, d) = nearest_centroid(row, &centroids);
            labels.push(label);
            (labels, inertia + d)
        },
    );

    let width = features.n_cols();
    let mut sums = vec![vec![0.0; width]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];
    for (row, &label) in features.rows().iter().zip(&labels) {
        for (acc, v) in sums[label].iter_mut().zip(row) {
            *acc += v;
        }
        counts[label] += 1;
    }

    let converged = centroids
        .iter()
        .zip(&sums)
        .zip(&counts)
        .filter(|(_, count)| **count > 0)
        .all(|((centroid, sum), &count)| {
            centroid.iter().zip(sum).all(|(c, s)| {
                let mean = s / count as f64;
                (c - mean).abs() <= TOLERANCE * mean.abs().max(1.0)
            })
        });

    let empty_clusters = counts
        .iter()
        .enumerate()
        .filter(|(_, c)| **c == 0)
        .map(|(i, _)| i)
        .collect();

    PartitionResult {
        labels,
        centroids,
        inertia,
        converged,
        empty_clusters,
    }
}

/// Row with the largest distance to its nearest centroid; lowest index on ties.
fn farthest_row<'a>(features: &'a FeatureMatrix, centroids: &[Vec<f64>]) -> &'a [f64] {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, row) in features.rows().iter().enumerate() {
        let d = nearest_centroid(row, centroids).1;
        if d > best.1 {
            best = (i, d);
        }
    }
    features.row(best.0)
}
