//! Quality sweeps across cluster counts and linkage methods.

use std::ops::RangeInclusive;

use density_map_cluster::{
    DistanceMatrix, PartitionConfig, cut_tree_clusters, hierarchical_from_distances,
    partition_sweep,
};
use density_map_cluster_models::{FeatureMatrix, LinkageMethod};

use crate::{
    CurvePoint, MethodCurve, MethodScore, QualityError, cophenetic_correlation,
    silhouette_with_distances,
};

/// k values of `ks` that can be scored on `n` rows.
fn scorable(ks: RangeInclusive<usize>, n: usize) -> impl Iterator<Item = usize> {
    ks.filter(move |&k| {
        let ok = (2..=n).contains(&k);
        if !ok {
            log::debug!("Skipping k={k} for {n} rows");
        }
        ok
    })
}

/// Silhouette score of the k-means run under `config` for every `k` in
/// `ks`; `config.k` is ignored.
///
/// # Errors
///
/// Returns [`QualityError`] if a run or its scoring fails.
pub fn partition_silhouette_curve(
    features: &FeatureMatrix,
    ks: RangeInclusive<usize>,
    config: &PartitionConfig,
) -> Result<Vec<CurvePoint>, QualityError> {
    let ks: Vec<usize> = scorable(ks, features.n_rows()).collect();
    let Some(&k_max) = ks.iter().max() else {
        return Ok(Vec::new());
    };
    let runs = partition_sweep(features, &config.with_k(k_max))?;
    let distances = DistanceMatrix::from_features(features);
    ks.into_iter()
        .map(|k| -> Result<CurvePoint, QualityError> {
            let value = silhouette_with_distances(&distances, &runs[k - 2].labels)?;
            log::debug!("k-means silhouette at k={k}: {value:.4}");
            Ok(CurvePoint { k, value })
        })
        .collect()
}

/// Silhouette curve per linkage method; each tree is built once and cut at
/// every `k` in `ks`.
///
/// # Errors
///
/// Returns [`QualityError`] if a tree or its scoring fails.
pub fn hierarchical_silhouette_curves(
    features: &FeatureMatrix,
    methods: &[LinkageMethod],
    ks: RangeInclusive<usize>,
) -> Result<Vec<MethodCurve>, QualityError> {
    let distances = DistanceMatrix::from_features(features);
    methods
        .iter()
        .map(|&method| -> Result<MethodCurve, QualityError> {
            let tree = hierarchical_from_distances(&distances, method)?;
            let points = scorable(ks.clone(), features.n_rows())
                .map(|k| -> Result<CurvePoint, QualityError> {
                    let labels = cut_tree_clusters(&tree, k)?;
                    let value = silhouette_with_distances(&distances, &labels)?;
                    Ok(CurvePoint { k, value })
                })
                .collect::<Result<Vec<_>, _>>()?;
            log::debug!("{method} silhouette curve has {} points", points.len());
            Ok(MethodCurve { method, points })
        })
        .collect()
}

/// Cophenetic correlation of the tree built by each linkage method.
///
/// A tree whose merge heights are all equal has no defined correlation; its
/// score is `None`.
///
/// # Errors
///
/// Returns [`QualityError`] if a tree fails.
pub fn cophenetic_by_method(
    features: &FeatureMatrix,
    methods: &[LinkageMethod],
) -> Result<Vec<MethodScore>, QualityError> {
    let distances = DistanceMatrix::from_features(features);
    methods
        .iter()
        .map(|&method| -> Result<MethodScore, QualityError> {
            let tree = hierarchical_from_distances(&distances, method)?;
            let value = match cophenetic_correlation(&tree, &distances) {
                Ok(value) => {
                    log::debug!("{method} cophenetic correlation: {value:.4}");
                    Some(value)
                }
                Err(QualityError::UndefinedCorrelation) => {
                    log::warn!("{method} cophenetic correlation is undefined");
                    None
                }
                Err(e) => return Err(e),
            };
            Ok(MethodScore { method, value })
        })
        .collect()
}
