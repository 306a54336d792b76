#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Map presentation of a clustering run.
//!
//! Joins clustered area rows to their boundary polygons, computes the
//! centroids the map uses for framing and selection markers, renders the
//! result as a `GeoJSON` `FeatureCollection`, and indexes the joined
//! polygons for point-in-polygon hover lookups.

pub mod collection;
pub mod index;
pub mod join;

use std::collections::BTreeMap;

use density_map_area_models::CellValue;
use density_map_cluster_models::DensityCategory;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use density_map_dataset::JoinKeyReport;
pub use index::AreaIndex;
pub use join::{BackgroundArea, JoinedArea, JoinedTable, join};

/// Errors that can occur while joining or presenting areas.
#[derive(Debug, thiserror::Error)]
pub enum GeoJoinError {
    /// The clustered rows and the geometry share no area keys.
    #[error("No area keys shared between {areas} clustered rows and {geometries} geometries")]
    NoKeyOverlap {
        /// Number of clustered rows.
        areas: usize,
        /// Number of geometry entries.
        geometries: usize,
    },

    /// The requested area is not part of the joined table.
    #[error("Unknown area: {area_id}")]
    UnknownArea {
        /// Requested key.
        area_id: String,
    },

    /// JSON conversion failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// How geometry rows without attribute data are treated.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
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
pub enum JoinMode {
    /// Drop them.
    #[default]
    Inner,
    /// Keep them as unclustered background polygons.
    Left,
}

/// One area of a clustering run before geometry is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusteredArea {
    /// Area key.
    pub area_id: String,
    /// Cluster label.
    pub cluster: usize,
    /// Category of the area's cluster.
    pub density_category: DensityCategory,
    /// Yearly population cells, as loaded.
    pub population_by_year: BTreeMap<i32, CellValue>,
}

impl ClusteredArea {
    /// Population for `year`, if the cell holds a valid number.
    #[must_use]
    pub fn population(&self, year: i32) -> Option<f64> {
        self.population_by_year
            .get(&year)
            .and_then(CellValue::as_number)
    }
}
