//! Elbow curve for k-means.

use std::ops::RangeInclusive;

use density_map_cluster::{PartitionConfig, partition_sweep, total_scatter};
use density_map_cluster_models::FeatureMatrix;

use crate::{CurvePoint, QualityError};

/// Inertia of the k-means run at every `k` in `ks`.
///
/// `k = 1` is the total scatter about the global mean. Larger `k` report
/// the inertia of [`density_map_cluster::partition_cluster_with`] under
/// `config` at that count, which never increases with `k`. Values of `k`
/// above the row count are skipped; `config.k` is ignored.
///
/// # Errors
///
/// * [`QualityError::EmptyRange`] if `ks` is empty or starts at 0.
/// * [`QualityError::Cluster`] if a k-means run fails.
pub fn inertia_curve(
    features: &FeatureMatrix,
    ks: RangeInclusive<usize>,
    config: &PartitionConfig,
) -> Result<Vec<CurvePoint>, QualityError> {
    if ks.is_empty() || *ks.start() == 0 {
        return Err(QualityError::EmptyRange);
    }

    let n = features.n_rows();
    let k_max = (*ks.end()).min(n);
    let runs = if k_max >= 2 {
        partition_sweep(features, &config.with_k(k_max))?
    } else {
        Vec::new()
    };

    let mut points = Vec::new();
    for k in ks {
        if k > n {
            log::debug!("Skipping k={k}: only {n} rows");
            continue;
        }
        let value = if k == 1 {
            total_scatter(features)
        } else {
            runs[k - 2].inertia
        };
        log::debug!("Inertia at k={k}: {value:.3}");
        points.push(CurvePoint { k, value });
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use density_map_cluster::{ClusterError, partition_cluster_with};

    use super::*;
    use crate::test_support::{matrix, villages};

    #[test]
    fn curve_is_non_increasing() {
        let features = villages();
        for seed in [0, 1, 42, 2024] {
            let curve = inertia_curve(&features, 1..=10, &PartitionConfig::new(10, seed)).unwrap();
            assert_eq!(curve.len(), 10);
            assert_eq!(curve[0].k, 1);
            for pair in curve.windows(2) {
                assert!(
                    pair[1].value <= pair[0].value * (1.0 + 1e-12),
                    "seed {seed}: k={} inertia {} > k={} inertia {}",
                    pair[1].k,
                    pair[1].value,
                    pair[0].k,
                    pair[0].value
                );
            }
        }
    }

    #[test]
    fn curve_reports_run_inertia() {
        let features = villages();
        for config in [PartitionConfig::new(0, 42), PartitionConfig::new(0, 7).with_n_init(1)] {
            let curve = inertia_curve(&features, 1..=10, &config).unwrap();
            for point in &curve[1..] {
                let run = partition_cluster_with(&features, &config.with_k(point.k)).unwrap();
                assert!(
                    (point.value - run.inertia).abs() <= 1e-9 * run.inertia.max(1.0),
                    "k={}: curve {} != run {}",
                    point.k,
                    point.value,
                    run.inertia
                );
            }
        }
    }

    #[test]
    fn curve_may_start_above_two() {
        let features = villages();
        let config = PartitionConfig::new(0, 42);
        let full = inertia_curve(&features, 1..=6, &config).unwrap();
        let tail = inertia_curve(&features, 4..=6, &config).unwrap();
        assert_eq!(tail, full[3..]);
    }

    #[test]
    fn k_one_is_total_scatter() {
        let features = matrix(&[&[0.0], &[2.0], &[4.0]]);
        let curve = inertia_curve(&features, 1..=3, &PartitionConfig::new(0, 42)).unwrap();
        assert!((curve[0].value - 8.0).abs() < 1e-12);
        assert!(curve[2].value.abs() < 1e-12);
    }

    #[test]
    fn large_k_is_skipped() {
        let features = matrix(&[&[0.0], &[2.0], &[4.0]]);
        let curve = inertia_curve(&features, 2..=6, &PartitionConfig::new(0, 42)).unwrap();
        let ks: Vec<usize> = curve.iter().map(|p| p.k).collect();
        assert_eq!(ks, [2, 3]);
    }

    #[test]
    fn empty_range_fails() {
        #[allow(clippy::reversed_empty_ranges)]
        let err = inertia_curve(&villages(), 5..=2, &PartitionConfig::new(0, 0)).unwrap_err();
        assert_eq!(err, QualityError::EmptyRange);
    }

    #[test]
    fn degenerate_input_propagates() {
        let rows: Vec<&[f64]> = vec![&[7.0]; 13];
        let err = inertia_curve(&matrix(&rows), 1..=3, &PartitionConfig::new(0, 0)).unwrap_err();
        assert_eq!(
            err,
            QualityError::Cluster(ClusterError::DegenerateInput { rows: 13 })
        );
    }
}
