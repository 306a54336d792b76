//! A single clustering run.

use std::collections::BTreeMap;

use density_map_cluster::{
    DistanceMatrix, cut_tree_clusters, cut_tree_distance, hierarchical_from_distances,
    partition_cluster_with,
};
use density_map_cluster_models::{
    DensityCategory, DensityThresholds, FeatureColumn, FeatureMatrix, LinkageMethod, LinkageTree,
    compute_centroids,
};
use density_map_dataset::{Dataset, JoinKeyReport};
use density_map_density::{ClusterCategory, classify};
use density_map_features::{FeatureError, extract_features};
use density_map_geojoin::{ClusteredArea, JoinedTable, join};
use density_map_quality::{QualityError, cophenetic_correlation, silhouette_with_distances};
use serde::{Deserialize, Serialize};

use crate::{DashboardConfig, PipelineError, Stage, StageResultExt as _};

/// How a linkage tree is cut into flat clusters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cut {
    /// Exactly this many clusters.
    Clusters(usize),
    /// Merge everything closer than this distance.
    Distance(f64),
}

/// Clustering algorithm and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Seeded k-means.
    Partition {
        /// Number of clusters.
        k: usize,
        /// k-means++ seed.
        seed: u64,
    },
    /// Agglomerative clustering.
    Hierarchical {
        /// Linkage criterion.
        linkage: LinkageMethod,
        /// Tree cut.
        cut: Cut,
    },
}

/// A user's selection on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    /// Year shown on the map and in cluster summaries.
    pub year: i32,
    /// Algorithm to run.
    pub algorithm: Algorithm,
    /// Density cutoffs.
    pub thresholds: DensityThresholds,
}

impl RunParams {
    /// k-means selection using the configured seed and thresholds.
    #[must_use]
    pub const fn partition(year: i32, k: usize, config: &DashboardConfig) -> Self {
        Self {
            year,
            algorithm: Algorithm::Partition {
                k,
                seed: config.partition.seed,
            },
            thresholds: config.partition.thresholds,
        }
    }

    /// Agglomerative selection cut into `k` clusters, using the configured
    /// thresholds.
    #[must_use]
    pub const fn hierarchical(
        year: i32,
        linkage: LinkageMethod,
        k: usize,
        config: &DashboardConfig,
    ) -> Self {
        Self {
            year,
            algorithm: Algorithm::Hierarchical {
                linkage,
                cut: Cut::Clusters(k),
            },
            thresholds: config.hierarchical.thresholds,
        }
    }

    /// Replaces the thresholds.
    #[must_use]
    pub const fn with_thresholds(mut self, thresholds: DensityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

/// Per-cluster figures for the cluster panels and bar charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    /// Cluster label.
    pub cluster: usize,
    /// Number of member areas.
    pub members: usize,
    /// Mean of the cluster's population centroid.
    pub centroid_mean: f64,
    /// Density category.
    pub category: DensityCategory,
    /// Largest member population in the selected year.
    pub year_max: Option<f64>,
    /// Total member population in the selected year.
    pub year_total: f64,
    /// Member area keys, in table order.
    pub area_ids: Vec<String>,
}

/// Everything the dashboard shows for one selection.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Selection that produced this result.
    pub params: RunParams,
    /// Version of the dataset the run used.
    pub dataset_version: u64,
    /// Feature matrix the algorithm ran on.
    pub features: FeatureMatrix,
    /// Clustered rows, in table order.
    pub clustered: Vec<ClusteredArea>,
    /// One summary per non-empty cluster, by label.
    pub summaries: Vec<ClusterSummary>,
    /// k-means inertia, for partition runs.
    pub inertia: Option<f64>,
    /// Linkage tree, for hierarchical runs.
    pub linkage: Option<LinkageTree>,
    /// Silhouette of the run; `None` when it produced a single cluster.
    pub silhouette: Option<f64>,
    /// Cophenetic correlation, for hierarchical runs where it is defined.
    pub cophenetic: Option<f64>,
    /// Clustered rows joined to their boundaries.
    pub joined: JoinedTable,
}

impl RunResult {
    /// Number of non-empty clusters.
    #[must_use]
    pub fn n_clusters(&self) -> usize {
        self.summaries.len()
    }

    /// Key match report of the geometry join.
    #[must_use]
    pub const fn join_report(&self) -> &JoinKeyReport {
        self.joined.report()
    }

    /// Clustered row for `area_id`.
    #[must_use]
    pub fn area(&self, area_id: &str) -> Option<&ClusteredArea> {
        self.clustered.iter().find(|a| a.area_id == area_id)
    }
}

struct Clustering {
    labels: Vec<usize>,
    inertia: Option<f64>,
    linkage: Option<LinkageTree>,
}

/// Runs the full pipeline for one selection.
///
/// # Errors
///
/// Returns [`PipelineError`] tagged with the stage that failed.
pub fn run(
    dataset: &Dataset,
    config: &DashboardConfig,
    params: &RunParams,
) -> Result<RunResult, PipelineError> {
    let table = dataset.table();

    if !table.has_year(params.year) {
        return Err(PipelineError::new(
            Stage::Extract,
            FeatureError::MissingColumn {
                column: params.year.to_string(),
            },
        ));
    }

    let features = extract_features(table, &config.features).at(Stage::Extract)?;
    log::info!(
        "Extracted {} x {} feature matrix",
        features.n_rows(),
        features.n_cols()
    );

    let distances = DistanceMatrix::from_features(&features);
    let clustering = cluster(&features, &distances, config, params.algorithm)?;
    let labels = clustering.labels;

    let silhouette = match silhouette_with_distances(&distances, &labels) {
        Ok(score) => Some(score),
        Err(QualityError::InsufficientClusters { found }) => {
            log::debug!("Silhouette undefined for {found} cluster(s)");
            None
        }
        Err(e) => return Err(PipelineError::new(Stage::Evaluate, e)),
    };

    let cophenetic = match &clustering.linkage {
        Some(tree) => match cophenetic_correlation(tree, &distances) {
            Ok(ccc) => Some(ccc),
            Err(QualityError::UndefinedCorrelation) => {
                log::warn!("Cophenetic correlation undefined for this tree");
                None
            }
            Err(e) => return Err(PipelineError::new(Stage::Evaluate, e)),
        },
        None => None,
    };

    let population = features.select_columns(FeatureColumn::is_population);
    let centroids = compute_centroids(&population, &labels);
    let classification = classify(&labels, &centroids, &params.thresholds).at(Stage::Classify)?;

    let clustered: Vec<ClusteredArea> = features
        .area_ids()
        .iter()
        .zip(labels.iter().zip(&classification.rows))
        .map(|(area_id, (&cluster, &density_category))| ClusteredArea {
            area_id: area_id.clone(),
            cluster,
            density_category,
            population_by_year: table
                .get(area_id)
                .map(|a| a.population_by_year.clone())
                .unwrap_or_default(),
        })
        .collect();

    let summaries = summarize(&clustered, &classification.clusters, params.year);
    log::info!(
        "Classified {} areas into {} clusters",
        clustered.len(),
        summaries.len()
    );

    let joined = join(&clustered, dataset.geometry(), config.geojoin.mode).at(Stage::Join)?;

    Ok(RunResult {
        params: *params,
        dataset_version: dataset.version(),
        features,
        clustered,
        summaries,
        inertia: clustering.inertia,
        linkage: clustering.linkage,
        silhouette,
        cophenetic,
        joined,
    })
}

fn cluster(
    features: &FeatureMatrix,
    distances: &DistanceMatrix,
    config: &DashboardConfig,
    algorithm: Algorithm,
) -> Result<Clustering, PipelineError> {
    match algorithm {
        Algorithm::Partition { k, seed } => {
            let partition = config.partition.kmeans(k, seed);
            let result = partition_cluster_with(features, &partition).at(Stage::Cluster)?;
            log::info!(
                "k-means k={k} converged={} inertia {:.3}",
                result.converged,
                result.inertia
            );
            Ok(Clustering {
                labels: result.labels,
                inertia: Some(result.inertia),
                linkage: None,
            })
        }
        Algorithm::Hierarchical { linkage, cut } => {
            let tree = hierarchical_from_distances(distances, linkage).at(Stage::Cluster)?;
            let labels = match cut {
                Cut::Clusters(k) => cut_tree_clusters(&tree, k),
                Cut::Distance(threshold) => cut_tree_distance(&tree, threshold),
            }
            .at(Stage::Cluster)?;
            log::info!("{linkage} linkage cut by {cut:?}");
            Ok(Clustering {
                labels,
                inertia: None,
                linkage: Some(tree),
            })
        }
    }
}

fn summarize(
    clustered: &[ClusteredArea],
    categories: &[ClusterCategory],
    year: i32,
) -> Vec<ClusterSummary> {
    let mut members: BTreeMap<usize, Vec<&ClusteredArea>> = BTreeMap::new();
    for area in clustered {
        members.entry(area.cluster).or_default().push(area);
    }

    categories
        .iter()
        .filter_map(|c| {
            let areas = members.get(&c.cluster)?;
            let populations: Vec<f64> = areas.iter().filter_map(|a| a.population(year)).collect();
            Some(ClusterSummary {
                cluster: c.cluster,
                members: areas.len(),
                centroid_mean: c.centroid_mean,
                category: c.category,
                year_max: populations.iter().copied().reduce(f64::max),
                year_total: populations.iter().sum(),
                area_ids: areas.iter().map(|a| a.area_id.clone()).collect(),
            })
        })
        .collect()
}
