#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Village area and yearly population types.
//!
//! These types represent the tabular side of the dataset: one row per
//! village-level administrative area with its yearly population counts and
//! centroid coordinates. Polygon geometry is owned by the dataset loader
//! and joined back by `area_id`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single parsed cell from the tabular dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    /// A valid numeric value.
    Number(f64),
    /// Blank, `NaN`, `NA`, or `null`.
    Missing,
    /// Present but not a usable number (the raw text is kept for errors).
    Invalid(String),
}

impl CellValue {
    /// Returns the numeric value if this cell holds one.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Missing | Self::Invalid(_) => None,
        }
    }

    /// Short description of the raw content, used in error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Number(value) => value.to_string(),
            Self::Missing => "<missing>".to_string(),
            Self::Invalid(raw) => format!("'{raw}'"),
        }
    }
}

/// One village-level administrative area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    /// Unique area key (e.g. `"CIBATU"`), shared with the geometry dataset.
    pub area_id: String,
    /// Population per year, ordered by year.
    pub population_by_year: BTreeMap<i32, CellValue>,
    /// Centroid latitude.
    pub latitude: CellValue,
    /// Centroid longitude.
    pub longitude: CellValue,
}

impl Area {
    /// Returns the population for `year` when the cell holds a valid number.
    #[must_use]
    pub fn population(&self, year: i32) -> Option<f64> {
        self.population_by_year
            .get(&year)
            .and_then(CellValue::as_number)
    }
}

/// The full tabular dataset in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaTable {
    /// Year columns present in the source file, ascending.
    pub years: Vec<i32>,
    /// Whether the source file had latitude/longitude columns.
    pub has_coordinates: bool,
    /// One entry per area, in file order.
    pub areas: Vec<Area>,
}

impl AreaTable {
    /// Number of areas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.areas.len()
    }

    /// Whether the table has no areas.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// Whether `year` is one of the table's year columns.
    #[must_use]
    pub fn has_year(&self, year: i32) -> bool {
        self.years.binary_search(&year).is_ok()
    }

    /// Looks up an area by key.
    #[must_use]
    pub fn get(&self, area_id: &str) -> Option<&Area> {
        self.areas.iter().find(|a| a.area_id == area_id)
    }
}

/// Population of one area in one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaPopulation {
    /// Area key.
    pub area_id: String,
    /// Population in the selected year.
    pub population: f64,
}

/// Year-over-year population change of one area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationChange {
    /// Area key.
    pub area_id: String,
    /// Population in the selected year.
    pub population: f64,
    /// Population minus the previous year's population.
    pub difference: f64,
}

/// Dataset-wide population statistics for a single year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationOverview {
    /// The selected year.
    pub year: i32,
    /// Areas sorted by population, largest first.
    pub ranked: Vec<AreaPopulation>,
    /// Sum over all areas with a valid value.
    pub total: f64,
    /// Total minus the previous year's total (if the previous year exists).
    pub total_delta: Option<f64>,
    /// Mean population per area.
    pub mean: f64,
    /// Most frequent population value (smallest on ties).
    pub mode: Option<f64>,
    /// Largest increase vs. the previous year.
    pub largest_increase: Option<PopulationChange>,
    /// Largest decrease vs. the previous year.
    pub largest_decrease: Option<PopulationChange>,
}
