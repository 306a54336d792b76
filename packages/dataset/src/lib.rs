#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Village population table and boundary geometry loading.
//!
//! Reads the yearly population CSV into an [`AreaTable`], reads village
//! boundary polygons from a `GeoJSON` `FeatureCollection` into a
//! [`GeometrySet`], and checks that the two datasets share area keys.
//! A loaded pair is bundled as a versioned [`Dataset`] so downstream
//! caches can tell reloads apart.

pub mod geometry;
pub mod keys;
pub mod overview;
pub mod table;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use density_map_area_models::AreaTable;

pub use geometry::{AreaGeometry, GeometrySet, load_geometry};
pub use keys::{JoinKeyReport, validate_join_keys};
pub use overview::population_overview;
pub use table::{TableSchema, load_area_table};

/// Errors that can occur while loading or validating datasets.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// A required column is absent.
    #[error("Missing column: {column}")]
    MissingColumn {
        /// Header name that was expected.
        column: String,
    },

    /// An area key appears on more than one row.
    #[error("Duplicate area key '{area_id}' at row {row}")]
    DuplicateKey {
        /// The repeated key.
        area_id: String,
        /// 1-based data row of the repeat.
        row: usize,
    },

    /// An area key is blank.
    #[error("Empty area key at row {row}")]
    EmptyKey {
        /// 1-based data row.
        row: usize,
    },

    /// The geometry document is not a `FeatureCollection`.
    #[error("Geometry file is not a GeoJSON FeatureCollection")]
    NotFeatureCollection,

    /// The table and the geometry share no area keys at all.
    #[error("No area keys shared between {areas} table rows and {geometries} geometries")]
    NoKeyOverlap {
        /// Number of table rows.
        areas: usize,
        /// Number of geometry entries.
        geometries: usize,
    },
}

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// A population table and its boundary geometry, stamped with a version.
///
/// Versions are unique per process, so two loads of the same files never
/// share cached results.
#[derive(Debug, Clone)]
pub struct Dataset {
    version: u64,
    table: AreaTable,
    geometry: GeometrySet,
}

impl Dataset {
    /// Bundles an already-loaded table and geometry set.
    #[must_use]
    pub fn new(table: AreaTable, geometry: GeometrySet) -> Self {
        Self {
            version: NEXT_VERSION.fetch_add(1, Ordering::Relaxed),
            table,
            geometry,
        }
    }

    /// Loads both files and validates their join keys.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError`] if either file cannot be read or parsed, or
    /// if the two datasets share no area keys.
    pub fn from_files(
        table_path: &Path,
        geometry_path: &Path,
        schema: &TableSchema,
        key_property: &str,
    ) -> Result<Self, DatasetError> {
        let table = load_area_table(std::fs::File::open(table_path)?, schema)?;
        log::info!(
            "Loaded {} areas with {} year columns from {}",
            table.len(),
            table.years.len(),
            table_path.display()
        );

        let geometry = load_geometry(std::fs::File::open(geometry_path)?, key_property)?;
        log::info!(
            "Loaded {} area geometries from {}",
            geometry.len(),
            geometry_path.display()
        );

        validate_join_keys(&table, &geometry)?;

        Ok(Self::new(table, geometry))
    }

    /// Process-unique version of this dataset.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// The population table.
    #[must_use]
    pub const fn table(&self) -> &AreaTable {
        &self.table
    }

    /// The boundary geometries.
    #[must_use]
    pub const fn geometry(&self) -> &GeometrySet {
        &self.geometry
    }
}
