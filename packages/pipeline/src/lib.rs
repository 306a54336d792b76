#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Run orchestration for the density dashboard.
//!
//! A run takes a loaded [`Dataset`], the dashboard configuration, and the
//! user's selection ([`RunParams`]) through extract, cluster, evaluate,
//! classify, and join, producing an immutable [`RunResult`]. A [`Session`]
//! caches results per selection and holds the one currently displayed.
//!
//! [`Dataset`]: density_map_dataset::Dataset

pub mod config;
pub mod diagnostics;
pub mod run;
pub mod session;

use density_map_cluster::ClusterError;
use density_map_dataset::DatasetError;
use density_map_density::DensityError;
use density_map_features::FeatureError;
use density_map_geojoin::GeoJoinError;
use density_map_quality::QualityError;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use config::{ConfigError, DashboardConfig};
pub use diagnostics::Diagnostics;
pub use run::{Algorithm, ClusterSummary, Cut, RunParams, RunResult, run};
pub use session::{RunKey, Session};

/// Pipeline stage a failure happened in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    /// Loading the input files.
    Load,
    /// Feature extraction.
    Extract,
    /// Clustering.
    Cluster,
    /// Quality scoring.
    Evaluate,
    /// Density classification.
    Classify,
    /// Geometry join.
    Join,
}

/// Underlying error of a failed stage.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Dataset loading failed.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// Feature extraction failed.
    #[error(transparent)]
    Feature(#[from] FeatureError),

    /// Clustering failed.
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// Scoring failed.
    #[error(transparent)]
    Quality(#[from] QualityError),

    /// Classification failed.
    #[error(transparent)]
    Density(#[from] DensityError),

    /// Join failed.
    #[error(transparent)]
    GeoJoin(#[from] GeoJoinError),
}

/// A pipeline failure and the stage it happened in.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    /// Failed stage.
    pub stage: Stage,
    /// Underlying error.
    #[source]
    pub source: StageError,
}

impl PipelineError {
    /// Wraps `source` as a failure of `stage`.
    pub fn new(stage: Stage, source: impl Into<StageError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// Extension for tagging stage results.
pub(crate) trait StageResultExt<T> {
    fn at(self, stage: Stage) -> Result<T, PipelineError>;
}

impl<T, E: Into<StageError>> StageResultExt<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::new(stage, e))
    }
}
