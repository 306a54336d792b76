//! Join key validation between the population table and the geometry set.

use density_map_area_models::AreaTable;
use serde::{Deserialize, Serialize};

use crate::{DatasetError, GeometrySet};

/// Outcome of comparing table keys against geometry keys.
///
/// A report with unmatched keys on either side is a partial join: the map
/// will show only the matched areas. That is expected when the two
/// datasets come from different publishers, so it is a warning rather
/// than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinKeyReport {
    /// Number of keys present on both sides.
    pub matched: usize,
    /// Table keys with no geometry, in table order.
    pub missing_geometry: Vec<String>,
    /// Geometry keys with no table row, in geometry order.
    pub missing_attributes: Vec<String>,
}

impl JoinKeyReport {
    /// Whether every key on both sides matched.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_geometry.is_empty() && self.missing_attributes.is_empty()
    }
}

/// Compares the area keys of a table and a geometry set.
///
/// # Errors
///
/// Returns [`DatasetError::NoKeyOverlap`] if the datasets share no keys.
pub fn validate_join_keys(
    table: &AreaTable,
    geometry: &GeometrySet,
) -> Result<JoinKeyReport, DatasetError> {
    let missing_geometry: Vec<String> = table
        .areas
        .iter()
        .filter(|a| !geometry.contains(&a.area_id))
        .map(|a| a.area_id.clone())
        .collect();

    let missing_attributes: Vec<String> = geometry
        .entries()
        .iter()
        .filter(|g| table.get(&g.area_id).is_none())
        .map(|g| g.area_id.clone())
        .collect();

    let matched = table.len() - missing_geometry.len();

    if matched == 0 {
        return Err(DatasetError::NoKeyOverlap {
            areas: table.len(),
            geometries: geometry.len(),
        });
    }

    let report = JoinKeyReport {
        matched,
        missing_geometry,
        missing_attributes,
    };

    if !report.is_complete() {
        log::warn!(
            "Join key mismatch: {} matched, {} areas without geometry, {} geometries without data",
            report.matched,
            report.missing_geometry.len(),
            report.missing_attributes.len()
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use density_map_area_models::{Area, CellValue};
    use geo::{MultiPolygon, polygon};

    use super::*;
    use crate::AreaGeometry;

    fn table(ids: &[&str]) -> AreaTable {
        AreaTable {
            years: vec![],
            has_coordinates: false,
            areas: ids
                .iter()
                .map(|id| Area {
                    area_id: (*id).to_string(),
                    population_by_year: BTreeMap::new(),
                    latitude: CellValue::Missing,
                    longitude: CellValue::Missing,
                })
                .collect(),
        }
    }

    fn geometry(ids: &[&str]) -> GeometrySet {
        GeometrySet::from_entries(ids.iter().map(|id| AreaGeometry {
            area_id: (*id).to_string(),
            polygon: MultiPolygon(vec![polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 1.0, y: 1.0),
            ]]),
        }))
    }

    #[test]
    fn full_overlap() {
        let report = validate_join_keys(&table(&["A", "B"]), &geometry(&["B", "A"])).unwrap();
        assert_eq!(report.matched, 2);
        assert!(report.is_complete());
    }

    #[test]
    fn partial_overlap_is_reported() {
        let report = validate_join_keys(&table(&["A", "B", "C"]), &geometry(&["B", "D"])).unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(report.missing_geometry, ["A", "C"]);
        assert_eq!(report.missing_attributes, ["D"]);
    }

    #[test]
    fn no_overlap_fails() {
        let err = validate_join_keys(&table(&["A"]), &geometry(&["B"])).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::NoKeyOverlap {
                areas: 1,
                geometries: 1
            }
        ));
    }
}
