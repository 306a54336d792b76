#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Feature selection for clustering.
//!
//! Turns an [`AreaTable`] into a [`FeatureMatrix`]: one row per area in
//! table order, one column per requested year in requested order, and
//! optionally the centroid coordinates. Missing or non-numeric cells fail
//! the extraction unless a [`NullPolicy`] says how to handle them.

use density_map_area_models::{Area, AreaTable, CellValue};
use density_map_cluster_models::{FeatureColumn, FeatureMatrix, MatrixShapeError};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Errors that can occur while extracting features.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    /// A requested column is not in the table.
    #[error("Missing column: {column}")]
    MissingColumn {
        /// Requested column name.
        column: String,
    },

    /// A selected cell is null or non-numeric and no imputation is configured.
    #[error("Invalid feature value {value} for area '{area_id}' in column {column}")]
    InvalidFeature {
        /// Area key of the offending row.
        area_id: String,
        /// Offending column.
        column: FeatureColumn,
        /// Description of the raw cell.
        value: String,
    },

    /// No rows are left to cluster.
    #[error("No rows left after feature extraction")]
    EmptyInput,

    /// The request selects no columns.
    #[error("Feature request selects no columns")]
    NoColumns,

    /// The assembled matrix is inconsistent.
    #[error("Feature matrix error: {0}")]
    Shape(#[from] MatrixShapeError),
}

/// What to do with missing or non-numeric cells.
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
pub enum NullPolicy {
    /// Reject the extraction.
    #[default]
    Fail,
    /// Replace with zero.
    Zero,
    /// Replace with the mean of the column's valid values.
    ColumnMean,
    /// Leave the row out of the matrix.
    DropRow,
}

/// Which columns to select and how to treat bad cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureRequest {
    /// Year columns, in output column order.
    pub years: Vec<i32>,
    /// Append `Latitude` and `Longitude` columns.
    pub include_coordinates: bool,
    /// Missing/invalid cell handling.
    pub null_policy: NullPolicy,
}

impl Default for FeatureRequest {
    fn default() -> Self {
        Self::years((2011..=2023).collect())
    }
}

impl FeatureRequest {
    /// Selects the given years only, failing on bad cells.
    #[must_use]
    pub const fn years(years: Vec<i32>) -> Self {
        Self {
            years,
            include_coordinates: false,
            null_policy: NullPolicy::Fail,
        }
    }

    /// Sets whether coordinate columns are appended.
    #[must_use]
    pub const fn with_coordinates(mut self, include: bool) -> Self {
        self.include_coordinates = include;
        self
    }

    /// Sets the null policy.
    #[must_use]
    pub const fn with_null_policy(mut self, policy: NullPolicy) -> Self {
        self.null_policy = policy;
        self
    }

    fn columns(&self) -> Vec<FeatureColumn> {
        let mut columns: Vec<FeatureColumn> =
            self.years.iter().copied().map(FeatureColumn::Year).collect();
        if self.include_coordinates {
            columns.push(FeatureColumn::Latitude);
            columns.push(FeatureColumn::Longitude);
        }
        columns
    }
}

fn cell(area: &Area, column: FeatureColumn) -> &CellValue {
    static MISSING: CellValue = CellValue::Missing;
    match column {
        FeatureColumn::Year(year) => area.population_by_year.get(&year).unwrap_or(&MISSING),
        FeatureColumn::Latitude => &area.latitude,
        FeatureColumn::Longitude => &area.longitude,
    }
}

/// Builds the feature matrix for `request`.
///
/// # Errors
///
/// * [`FeatureError::MissingColumn`] if a requested year (or the
///   coordinates) is not in the table.
/// * [`FeatureError::InvalidFeature`] if a cell is unusable under
///   [`NullPolicy::Fail`], or a whole column is unusable under
///   [`NullPolicy::ColumnMean`].
/// * [`FeatureError::EmptyInput`] if no rows remain.
pub fn extract_features(
    table: &AreaTable,
    request: &FeatureRequest,
) -> Result<FeatureMatrix, FeatureError> {
    if let Some(year) = request.years.iter().find(|y| !table.has_year(**y)) {
        return Err(FeatureError::MissingColumn {
            column: year.to_string(),
        });
    }
    if request.include_coordinates && !table.has_coordinates {
        return Err(FeatureError::MissingColumn {
            column: FeatureColumn::Latitude.to_string(),
        });
    }

    let columns = request.columns();
    if columns.is_empty() {
        return Err(FeatureError::NoColumns);
    }

    let mut raw: Vec<Vec<Option<f64>>> = table
        .areas
        .iter()
        .map(|area| {
            columns
                .iter()
                .map(|&c| cell(area, c).as_number())
                .collect()
        })
        .collect();

    let mut area_ids: Vec<String> = table.areas.iter().map(|a| a.area_id.clone()).collect();

    match request.null_policy {
        NullPolicy::Fail => {
            let first_bad = raw
                .iter()
                .enumerate()
                .find_map(|(i, row)| row.iter().position(Option::is_none).map(|j| (i, j)));
            if let Some((i, j)) = first_bad {
                return Err(invalid(&table.areas[i], columns[j]));
            }
        }
        NullPolicy::Zero => {
            let imputed = impute(&mut raw, |_| Some(0.0));
            log::debug!("Imputed {imputed} cells with zero");
        }
        NullPolicy::ColumnMean => {
            let means = column_means(&raw, columns.len());
            if let Some(j) = means.iter().position(Option::is_none) {
                let i = raw.iter().position(|row| row[j].is_none()).unwrap_or(0);
                return Err(invalid(&table.areas[i], columns[j]));
            }
            let imputed = impute(&mut raw, |j| means[j]);
            log::debug!("Imputed {imputed} cells with column means");
        }
        NullPolicy::DropRow => {
            let before = raw.len();
            let (kept_ids, kept_rows): (Vec<String>, Vec<Vec<Option<f64>>>) = area_ids
                .into_iter()
                .zip(raw)
                .filter(|(_, row)| row.iter().all(Option::is_some))
                .unzip();
            area_ids = kept_ids;
            raw = kept_rows;
            if raw.len() < before {
                log::info!("Dropped {} rows with missing features", before - raw.len());
            }
        }
    }

    if raw.is_empty() {
        return Err(FeatureError::EmptyInput);
    }

    let rows: Vec<Vec<f64>> = raw
        .into_iter()
        .map(|row| row.into_iter().map(|v| v.unwrap_or(0.0)).collect())
        .collect();

    Ok(FeatureMatrix::new(area_ids, columns, rows)?)
}

fn invalid(area: &Area, column: FeatureColumn) -> FeatureError {
    FeatureError::InvalidFeature {
        area_id: area.area_id.clone(),
        column,
        value: cell(area, column).describe(),
    }
}

fn impute(raw: &mut [Vec<Option<f64>>], fill: impl Fn(usize) -> Option<f64>) -> usize {
    let mut count = 0;
    for row in raw.iter_mut() {
        for (j, value) in row.iter_mut().enumerate() {
            if value.is_none() {
                *value = fill(j);
                count += 1;
            }
        }
    }
    count
}

#[allow(clippy::cast_precision_loss)]
fn column_means(raw: &[Vec<Option<f64>>], n_cols: usize) -> Vec<Option<f64>> {
    (0..n_cols)
        .map(|j| {
            let (sum, n) = raw
                .iter()
                .filter_map(|row| row[j])
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            (n > 0).then(|| sum / n as f64)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn area(id: &str, values: &[CellValue]) -> Area {
        Area {
            area_id: id.to_string(),
            population_by_year: (2011..).zip(values.iter().cloned()).collect::<BTreeMap<_, _>>(),
            latitude: CellValue::Number(-6.5),
            longitude: CellValue::Number(107.4),
        }
    }

    fn table() -> AreaTable {
        use CellValue::{Invalid, Missing, Number};
        AreaTable {
            years: vec![2011, 2012, 2013],
            has_coordinates: true,
            areas: vec![
                area("A", &[Number(1.0), Number(2.0), Number(3.0)]),
                area("B", &[Number(3.0), Missing, Number(5.0)]),
                area("C", &[Number(5.0), Number(6.0), Invalid("x".into())]),
            ],
        }
    }

    #[test]
    fn selects_requested_columns_in_order() {
        let matrix = extract_features(&table(), &FeatureRequest::years(vec![2011])).unwrap();
        assert_eq!(matrix.n_rows(), 3);
        assert_eq!(matrix.row(2), &[5.0]);

        let matrix = extract_features(
            &table(),
            &FeatureRequest::years(vec![2011]).with_coordinates(true),
        )
        .unwrap();
        assert_eq!(
            matrix.columns(),
            &[
                FeatureColumn::Year(2011),
                FeatureColumn::Latitude,
                FeatureColumn::Longitude
            ]
        );
        assert_eq!(matrix.row(0), &[1.0, -6.5, 107.4]);
        assert_eq!(matrix.area_ids(), ["A", "B", "C"]);
    }

    #[test]
    fn reversed_year_order_is_kept() {
        let err = extract_features(&table(), &FeatureRequest::years(vec![2012, 2011])).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidFeature { ref area_id, .. } if area_id == "B"));

        let matrix = extract_features(
            &table(),
            &FeatureRequest::years(vec![2012, 2011]).with_null_policy(NullPolicy::Zero),
        )
        .unwrap();
        assert_eq!(matrix.row(0), &[2.0, 1.0]);
        assert_eq!(matrix.row(1), &[0.0, 3.0]);
    }

    #[test]
    fn missing_year_fails() {
        let err = extract_features(&table(), &FeatureRequest::years(vec![2011, 2020])).unwrap_err();
        assert!(matches!(err, FeatureError::MissingColumn { column } if column == "2020"));
    }

    #[test]
    fn null_fails_by_default() {
        let err = extract_features(&table(), &FeatureRequest::years(vec![2011, 2012, 2013])).unwrap_err();
        match err {
            FeatureError::InvalidFeature {
                area_id, column, ..
            } => {
                assert_eq!(area_id, "B");
                assert_eq!(column, FeatureColumn::Year(2012));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_numeric_fails_by_default() {
        let err = extract_features(&table(), &FeatureRequest::years(vec![2013])).unwrap_err();
        assert!(matches!(
            err,
            FeatureError::InvalidFeature { ref value, .. } if value == "'x'"
        ));
    }

    #[test]
    fn column_mean_imputation() {
        let request =
            FeatureRequest::years(vec![2011, 2012, 2013]).with_null_policy(NullPolicy::ColumnMean);
        let matrix = extract_features(&table(), &request).unwrap();
        assert_eq!(matrix.row(1), &[3.0, 4.0, 5.0]);
        assert_eq!(matrix.row(2), &[5.0, 6.0, 4.0]);
    }

    #[test]
    fn drop_row_policy() {
        let request =
            FeatureRequest::years(vec![2011, 2012, 2013]).with_null_policy(NullPolicy::DropRow);
        let matrix = extract_features(&table(), &request).unwrap();
        assert_eq!(matrix.n_rows(), 1);
        assert_eq!(matrix.area_ids(), ["A"]);
    }

    #[test]
    fn dropping_every_row_is_empty_input() {
        let mut t = table();
        t.areas.remove(0);
        let request =
            FeatureRequest::years(vec![2011, 2012, 2013]).with_null_policy(NullPolicy::DropRow);
        assert!(matches!(
            extract_features(&t, &request),
            Err(FeatureError::EmptyInput)
        ));
    }

    #[test]
    fn coordinates_required_when_requested() {
        let mut t = table();
        t.has_coordinates = false;
        let request = FeatureRequest::years(vec![2011]).with_coordinates(true);
        assert!(matches!(
            extract_features(&t, &request),
            Err(FeatureError::MissingColumn { .. })
        ));
    }

    #[test]
    fn empty_request_fails() {
        assert!(matches!(
            extract_features(&table(), &FeatureRequest::years(vec![])),
            Err(FeatureError::NoColumns)
        ));
    }
}
