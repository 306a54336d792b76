//! Population table (CSV) loader.
//!
//! Year columns are detected from headers that parse as a year; the area
//! key and coordinate columns are named by a [`TableSchema`]. Any other
//! column (such as an unnamed row index) is ignored.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::ops::RangeInclusive;

use density_map_area_models::{Area, AreaTable, CellValue};
use serde::{Deserialize, Serialize};

use crate::DatasetError;

/// Header values accepted as year columns.
const YEAR_RANGE: RangeInclusive<i32> = 1900..=2100;

/// Column names of the population table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSchema {
    /// Area key column.
    pub id_column: String,
    /// Centroid latitude column.
    pub latitude_column: String,
    /// Centroid longitude column.
    pub longitude_column: String,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            id_column: "DESA_1".to_string(),
            latitude_column: "Latitude".to_string(),
            longitude_column: "Longitude".to_string(),
        }
    }
}

/// Parses a population CSV into an [`AreaTable`].
///
/// # Errors
///
/// Returns [`DatasetError::MissingColumn`] if the key column is absent,
/// [`DatasetError::EmptyKey`] / [`DatasetError::DuplicateKey`] for bad keys,
/// or [`DatasetError::Csv`] if the file is malformed.
pub fn load_area_table(reader: impl Read, schema: &TableSchema) -> Result<AreaTable, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();

    let id_idx = position(&headers, &schema.id_column).ok_or_else(|| {
        DatasetError::MissingColumn {
            column: schema.id_column.clone(),
        }
    })?;
    let lat_idx = position(&headers, &schema.latitude_column);
    let lon_idx = position(&headers, &schema.longitude_column);

    let year_columns: Vec<(usize, i32)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| parse_year(h).map(|y| (i, y)))
        .collect();

    if year_columns.is_empty() {
        log::warn!("Population table has no year columns");
    }

    let mut seen = BTreeSet::new();
    let mut areas = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        let row = row_idx + 1;

        let area_id = record.get(id_idx).unwrap_or("").to_owned();
        if area_id.is_empty() {
            return Err(DatasetError::EmptyKey { row });
        }
        if !seen.insert(area_id.clone()) {
            return Err(DatasetError::DuplicateKey { area_id, row });
        }

        let population_by_year: BTreeMap<i32, CellValue> = year_columns
            .iter()
            .map(|&(i, year)| (year, parse_count(record.get(i).unwrap_or(""))))
            .collect();

        let coordinate = |idx: Option<usize>| {
            idx.map_or(CellValue::Missing, |i| {
                parse_coordinate(record.get(i).unwrap_or(""))
            })
        };

        areas.push(Area {
            area_id,
            population_by_year,
            latitude: coordinate(lat_idx),
            longitude: coordinate(lon_idx),
        });
    }

    let mut years: Vec<i32> = year_columns.iter().map(|&(_, y)| y).collect();
    years.sort_unstable();
    years.dedup();

    log::debug!(
        "Parsed {} population rows (years {:?}, coordinates: {})",
        areas.len(),
        years,
        lat_idx.is_some() && lon_idx.is_some()
    );

    Ok(AreaTable {
        years,
        has_coordinates: lat_idx.is_some() && lon_idx.is_some(),
        areas,
    })
}

fn position(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn parse_year(header: &str) -> Option<i32> {
    header.parse::<i32>().ok().filter(|y| YEAR_RANGE.contains(y))
}

fn is_missing_marker(raw: &str) -> bool {
    raw.is_empty()
        || ["nan", "na", "null", "none"]
            .iter()
            .any(|m| raw.eq_ignore_ascii_case(m))
}

/// Population counts must be finite and non-negative.
fn parse_count(raw: &str) -> CellValue {
    match parse_coordinate(raw) {
        CellValue::Number(v) if v < 0.0 => CellValue::Invalid(raw.to_owned()),
        other => other,
    }
}

fn parse_coordinate(raw: &str) -> CellValue {
    let raw = raw.trim();
    if is_missing_marker(raw) {
        return CellValue::Missing;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => CellValue::Number(v),
        _ => CellValue::Invalid(raw.to_owned()),
    }
}
