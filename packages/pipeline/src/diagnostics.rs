//! Model-selection charts: elbow curve, silhouette sweeps, and cophenetic
//! correlation per linkage method.

use density_map_dataset::Dataset;
use density_map_features::extract_features;
use density_map_quality::{
    CurvePoint, MethodCurve, MethodScore, cophenetic_by_method, hierarchical_silhouette_curves,
    inertia_curve, partition_silhouette_curve,
};
use serde::{Deserialize, Serialize};

use crate::{DashboardConfig, PipelineError, Stage, StageResultExt as _};

/// Chart data computed once per dataset and configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    /// k-means inertia over the partition k range.
    pub inertia_curve: Vec<CurvePoint>,
    /// k-means silhouette over the partition k range.
    pub partition_silhouette: Vec<CurvePoint>,
    /// Silhouette curve per linkage method over the hierarchical k range.
    pub hierarchical_silhouette: Vec<MethodCurve>,
    /// Cophenetic correlation per linkage method.
    pub cophenetic: Vec<MethodScore>,
}

impl Diagnostics {
    /// Computes every chart from the configured feature selection.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] at [`Stage::Extract`] if features cannot be
    /// built, or at [`Stage::Evaluate`] if a curve fails.
    pub fn compute(dataset: &Dataset, config: &DashboardConfig) -> Result<Self, PipelineError> {
        let features = extract_features(dataset.table(), &config.features).at(Stage::Extract)?;
        let kmeans = config.partition.kmeans(config.partition.k_max, config.partition.seed);
        let methods = &config.hierarchical.methods;

        let inertia_curve =
            inertia_curve(&features, config.partition.k_range(), &kmeans).at(Stage::Evaluate)?;
        let partition_silhouette =
            partition_silhouette_curve(&features, config.partition.k_range(), &kmeans)
                .at(Stage::Evaluate)?;
        let hierarchical_silhouette =
            hierarchical_silhouette_curves(&features, methods, config.hierarchical.k_range())
                .at(Stage::Evaluate)?;
        let cophenetic = cophenetic_by_method(&features, methods).at(Stage::Evaluate)?;

        log::info!(
            "Computed diagnostics for {} areas ({} inertia points, {} linkage methods)",
            features.n_rows(),
            inertia_curve.len(),
            cophenetic.len()
        );

        Ok(Self {
            inertia_curve,
            partition_silhouette,
            hierarchical_silhouette,
            cophenetic,
        })
    }

    /// The k with the highest k-means silhouette; ties go to the smaller k.
    #[must_use]
    pub fn best_partition_k(&self) -> Option<usize> {
        best_point(&self.partition_silhouette).map(|p| p.k)
    }

    /// The linkage method with the highest defined cophenetic correlation.
    #[must_use]
    pub fn best_cophenetic(&self) -> Option<&MethodScore> {
        self.cophenetic
            .iter()
            .filter(|s| s.value.is_some())
            .reduce(|best, s| if s.value > best.value { s } else { best })
    }
}

fn best_point(points: &[CurvePoint]) -> Option<&CurvePoint> {
    points
        .iter()
        .reduce(|best, p| if p.value > best.value { p } else { best })
}

#[cfg(test)]
mod tests {
    use density_map_cluster_models::LinkageMethod;

    use super::*;
    use crate::test_support::dataset;
    use crate::{RunParams, run};

    fn config() -> DashboardConfig {
        let mut config = DashboardConfig::default();
        config.features.years = vec![2021, 2022, 2023];
        config
    }

    #[test]
    fn charts_cover_configured_ranges() {
        let diagnostics = Diagnostics::compute(&dataset(), &config()).unwrap();

        let ks: Vec<usize> = diagnostics.inertia_curve.iter().map(|p| p.k).collect();
        assert_eq!(ks, (1..=10).collect::<Vec<_>>());
        assert!(
            diagnostics
                .inertia_curve
                .windows(2)
                .all(|w| w[1].value <= w[0].value * (1.0 + 1e-12))
        );
        assert!(diagnostics.inertia_curve.last().unwrap().value.abs() < 1e-6);

        let ks: Vec<usize> = diagnostics.partition_silhouette.iter().map(|p| p.k).collect();
        assert_eq!(ks, (2..=10).collect::<Vec<_>>());

        assert_eq!(diagnostics.hierarchical_silhouette.len(), 4);
        for curve in &diagnostics.hierarchical_silhouette {
            assert_eq!(curve.points.len(), 9);
        }

        let methods: Vec<LinkageMethod> =
            diagnostics.cophenetic.iter().map(|s| s.method).collect();
        assert_eq!(methods, LinkageMethod::all());
        assert!(
            diagnostics
                .cophenetic
                .iter()
                .all(|s| s.value.is_some_and(|v| (-1.0..=1.0).contains(&v)))
        );
    }

    #[test]
    fn best_choices_are_curve_maxima() {
        let diagnostics = Diagnostics::compute(&dataset(), &config()).unwrap();

        let best_k = diagnostics.best_partition_k().unwrap();
        let best = diagnostics
            .partition_silhouette
            .iter()
            .find(|p| p.k == best_k)
            .unwrap();
        assert!(
            diagnostics
                .partition_silhouette
                .iter()
                .all(|p| p.value <= best.value)
        );
        assert!(best.value > 0.0);

        let best = diagnostics.best_cophenetic().unwrap();
        assert!(diagnostics.cophenetic.iter().all(|s| s.value <= best.value));
    }

    #[test]
    fn elbow_matches_dashboard_runs() {
        let dataset = dataset();
        let config = config();
        let diagnostics = Diagnostics::compute(&dataset, &config).unwrap();
        for point in diagnostics.inertia_curve.iter().filter(|p| p.k >= 2) {
            let params = RunParams::partition(2023, point.k, &config);
            let result = run(&dataset, &config, &params).unwrap();
            let inertia = result.inertia.unwrap();
            assert!(
                (point.value - inertia).abs() <= 1e-9 * inertia.max(1.0),
                "k={}: elbow {} != run {inertia}",
                point.k,
                point.value
            );
        }
    }

    #[test]
    fn undefined_scores_never_win() {
        let diagnostics = Diagnostics {
            inertia_curve: Vec::new(),
            partition_silhouette: Vec::new(),
            hierarchical_silhouette: Vec::new(),
            cophenetic: vec![
                MethodScore {
                    method: LinkageMethod::Single,
                    value: None,
                },
                MethodScore {
                    method: LinkageMethod::Ward,
                    value: Some(-0.2),
                },
            ],
        };
        assert_eq!(
            diagnostics.best_cophenetic().unwrap().method,
            LinkageMethod::Ward
        );
    }

    #[test]
    fn extraction_failures_are_reported_at_extract() {
        let mut config = config();
        config.features.years = vec![2030];
        let err = Diagnostics::compute(&dataset(), &config).unwrap_err();
        assert_eq!(err.stage, Stage::Extract);
    }
}
