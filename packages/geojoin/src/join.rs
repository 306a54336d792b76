//! Attribute/geometry join.

use std::collections::{BTreeMap, BTreeSet};

use density_map_dataset::{GeometrySet, JoinKeyReport};
use geo::{Centroid as _, MultiPolygon, Point};

use crate::{AreaIndex, ClusteredArea, GeoJoinError, JoinMode};

/// A clustered area with its boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedArea {
    /// Cluster attributes.
    pub attributes: ClusteredArea,
    /// Boundary polygons.
    pub polygon: MultiPolygon<f64>,
    /// Polygon centroid; `None` for an empty polygon.
    pub centroid: Option<Point<f64>>,
}

/// A boundary with no attribute row, kept by [`JoinMode::Left`].
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundArea {
    /// Area key.
    pub area_id: String,
    /// Boundary polygons.
    pub polygon: MultiPolygon<f64>,
    /// Polygon centroid.
    pub centroid: Option<Point<f64>>,
}

/// Result of joining a clustering run to the boundary set.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedTable {
    mode: JoinMode,
    rows: Vec<JoinedArea>,
    background: Vec<BackgroundArea>,
    report: JoinKeyReport,
    framing_centroid: Option<Point<f64>>,
}

/// Joins `clustered` rows to `geometry` on the area key.
///
/// Joined rows follow geometry order. Rows without geometry are listed in
/// the report and left out of the table.
///
/// # Errors
///
/// Returns [`GeoJoinError::NoKeyOverlap`] if no row has a geometry.
pub fn join(
    clustered: &[ClusteredArea],
    geometry: &GeometrySet,
    mode: JoinMode,
) -> Result<JoinedTable, GeoJoinError> {
    let by_id: BTreeMap<&str, &ClusteredArea> =
        clustered.iter().map(|a| (a.area_id.as_str(), a)).collect();

    let mut rows = Vec::new();
    let mut background = Vec::new();
    let mut missing_attributes = Vec::new();

    for entry in geometry.entries() {
        let centroid = entry.polygon.centroid();
        if let Some(attributes) = by_id.get(entry.area_id.as_str()) {
            rows.push(JoinedArea {
                attributes: (*attributes).clone(),
                polygon: entry.polygon.clone(),
                centroid,
            });
        } else {
            missing_attributes.push(entry.area_id.clone());
            if mode == JoinMode::Left {
                background.push(BackgroundArea {
                    area_id: entry.area_id.clone(),
                    polygon: entry.polygon.clone(),
                    centroid,
                });
            }
        }
    }

    if rows.is_empty() {
        return Err(GeoJoinError::NoKeyOverlap {
            areas: clustered.len(),
            geometries: geometry.len(),
        });
    }

    let missing_geometry: Vec<String> = clustered
        .iter()
        .filter(|a| !geometry.contains(&a.area_id))
        .map(|a| a.area_id.clone())
        .collect();

    let report = JoinKeyReport {
        matched: rows.len(),
        missing_geometry,
        missing_attributes,
    };

    if !report.is_complete() {
        log::warn!(
            "Joined {} areas; {} without geometry, {} geometries without a cluster",
            report.matched,
            report.missing_geometry.len(),
            report.missing_attributes.len()
        );
    }

    let framing_centroid = mean_point(rows.iter().filter_map(|r| r.centroid));

    log::info!(
        "Joined {} clustered areas to boundaries ({mode} join, {} background)",
        rows.len(),
        background.len()
    );

    Ok(JoinedTable {
        mode,
        rows,
        background,
        report,
        framing_centroid,
    })
}

#[allow(clippy::cast_precision_loss)]
fn mean_point(points: impl Iterator<Item = Point<f64>>) -> Option<Point<f64>> {
    let (sum_x, sum_y, n) = points.fold((0.0, 0.0, 0usize), |(x, y, n), p| {
        (x + p.x(), y + p.y(), n + 1)
    });
    (n > 0).then(|| Point::new(sum_x / n as f64, sum_y / n as f64))
}

impl JoinedTable {
    /// Join mode the table was built with.
    #[must_use]
    pub const fn mode(&self) -> JoinMode {
        self.mode
    }

    /// Joined rows, in geometry order.
    #[must_use]
    pub fn rows(&self) -> &[JoinedArea] {
        &self.rows
    }

    /// Boundaries kept without attributes.
    #[must_use]
    pub fn background(&self) -> &[BackgroundArea] {
        &self.background
    }

    /// Key match report.
    #[must_use]
    pub const fn report(&self) -> &JoinKeyReport {
        &self.report
    }

    /// Mean of the joined polygons' centroids, used to frame the map.
    #[must_use]
    pub const fn framing_centroid(&self) -> Option<Point<f64>> {
        self.framing_centroid
    }

    /// The clustered rows without geometry.
    #[must_use]
    pub fn attributes(&self) -> Vec<ClusteredArea> {
        self.rows.iter().map(|r| r.attributes.clone()).collect()
    }

    /// Joined row for `area_id`.
    #[must_use]
    pub fn get(&self, area_id: &str) -> Option<&JoinedArea> {
        self.rows.iter().find(|r| r.attributes.area_id == area_id)
    }

    /// Marker position for the selected area.
    ///
    /// # Errors
    ///
    /// Returns [`GeoJoinError::UnknownArea`] if `area_id` is neither a
    /// joined row nor a background area, or its polygon is empty.
    pub fn focus(&self, area_id: &str) -> Result<Point<f64>, GeoJoinError> {
        self.get(area_id)
            .and_then(|r| r.centroid)
            .or_else(|| {
                self.background
                    .iter()
                    .find(|b| b.area_id == area_id)
                    .and_then(|b| b.centroid)
            })
            .ok_or_else(|| GeoJoinError::UnknownArea {
                area_id: area_id.to_string(),
            })
    }

    /// Distinct cluster labels present in the joined rows.
    #[must_use]
    pub fn clusters(&self) -> BTreeSet<usize> {
        self.rows.iter().map(|r| r.attributes.cluster).collect()
    }

    /// Point-in-polygon index over the joined and background polygons.
    #[must_use]
    pub fn area_index(&self) -> AreaIndex {
        AreaIndex::new(
            self.rows
                .iter()
                .map(|r| (r.attributes.area_id.clone(), r.polygon.clone()))
                .chain(
                    self.background
                        .iter()
                        .map(|b| (b.area_id.clone(), b.polygon.clone())),
                ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{clustered, geometry};

    #[test]
    fn inner_join_follows_geometry_order() {
        let table = join(&clustered(), &geometry(), JoinMode::Inner).unwrap();
        let ids: Vec<&str> = table
            .rows()
            .iter()
            .map(|r| r.attributes.area_id.as_str())
            .collect();
        assert_eq!(ids, ["C", "A", "B"]);
        assert!(table.background().is_empty());

        let report = table.report();
        assert_eq!(report.matched, 3);
        assert_eq!(report.missing_geometry, ["X"]);
        assert_eq!(report.missing_attributes, ["Z"]);
    }

    #[test]
    fn left_join_keeps_background() {
        let table = join(&clustered(), &geometry(), JoinMode::Left).unwrap();
        assert_eq!(table.rows().len(), 3);
        assert_eq!(table.background().len(), 1);
        assert_eq!(table.background()[0].area_id, "Z");
        assert_eq!(table.mode(), JoinMode::Left);
    }

    #[test]
    fn dropping_geometry_reproduces_matched_rows() {
        let input = clustered();
        let table = join(&input, &geometry(), JoinMode::Left).unwrap();

        let mut roundtrip = table.attributes();
        roundtrip.sort_by(|a, b| a.area_id.cmp(&b.area_id));
        let expected: Vec<ClusteredArea> = input
            .into_iter()
            .filter(|a| !table.report().missing_geometry.contains(&a.area_id))
            .collect();
        assert_eq!(roundtrip, expected);
    }

    #[test]
    fn centroids_and_framing() {
        let table = join(&clustered(), &geometry(), JoinMode::Left).unwrap();
        let a = table.focus("A").unwrap();
        assert!((a.x() - 0.5).abs() < 1e-12 && (a.y() - 0.5).abs() < 1e-12);

        let frame = table.framing_centroid().unwrap();
        assert!((frame.x() - 1.5).abs() < 1e-12);
        assert!((frame.y() - 0.5).abs() < 1e-12);

        let z = table.focus("Z").unwrap();
        assert!((z.x() - 10.5).abs() < 1e-12);
        assert!(matches!(
            table.focus("X"),
            Err(GeoJoinError::UnknownArea { area_id }) if area_id == "X"
        ));
    }

    #[test]
    fn no_overlap_fails() {
        let rows = vec![crate::test_support::area("Q", 0, 1.0)];
        let err = join(&rows, &geometry(), JoinMode::Inner).unwrap_err();
        assert!(matches!(
            err,
            GeoJoinError::NoKeyOverlap {
                areas: 1,
                geometries: 4
            }
        ));
    }

    #[test]
    fn cluster_set() {
        let table = join(&clustered(), &geometry(), JoinMode::Inner).unwrap();
        assert_eq!(table.clusters().into_iter().collect::<Vec<_>>(), [0, 1]);
    }
}
