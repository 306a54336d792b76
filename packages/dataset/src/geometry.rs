//! Village boundary (`GeoJSON`) loader.
//!
//! Every feature of the `FeatureCollection` is converted to a
//! [`MultiPolygon`] and keyed by a property value. Features that share a
//! key are merged into one multipolygon (villages with exclaves are often
//! published as several features).

use std::collections::BTreeMap;
use std::io::Read;

use geo::MultiPolygon;
use geojson::GeoJson;

use crate::DatasetError;

/// Boundary of one area.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaGeometry {
    /// Area key, matching the population table.
    pub area_id: String,
    /// Boundary polygons.
    pub polygon: MultiPolygon<f64>,
}

/// All boundaries in first-appearance order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometrySet {
    entries: Vec<AreaGeometry>,
    index: BTreeMap<String, usize>,
}

impl GeometrySet {
    /// Builds a set, merging entries that share a key.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = AreaGeometry>) -> Self {
        let mut set = Self::default();
        for entry in entries {
            set.insert(entry);
        }
        set
    }

    fn insert(&mut self, entry: AreaGeometry) {
        if let Some(&idx) = self.index.get(&entry.area_id) {
            log::debug!("Merging additional polygons into area {}", entry.area_id);
            self.entries[idx].polygon.0.extend(entry.polygon.0);
        } else {
            self.index.insert(entry.area_id.clone(), self.entries.len());
            self.entries.push(entry);
        }
    }

    /// Number of distinct area keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-appearance order.
    #[must_use]
    pub fn entries(&self) -> &[AreaGeometry] {
        &self.entries
    }

    /// Looks up a boundary by area key.
    #[must_use]
    pub fn get(&self, area_id: &str) -> Option<&AreaGeometry> {
        self.index.get(area_id).map(|&i| &self.entries[i])
    }

    /// Whether a boundary exists for `area_id`.
    #[must_use]
    pub fn contains(&self, area_id: &str) -> bool {
        self.index.contains_key(area_id)
    }
}

/// Parses a `GeoJSON` `FeatureCollection`, keying features by `key_property`.
///
/// Features without a usable key or without polygonal geometry are skipped
/// with a warning.
///
/// # Errors
///
/// Returns [`DatasetError`] if the input cannot be read, is not valid
/// `GeoJSON`, or is not a `FeatureCollection`.
pub fn load_geometry(mut reader: impl Read, key_property: &str) -> Result<GeometrySet, DatasetError> {
    let mut body = String::new();
    reader.read_to_string(&mut body)?;

    let geojson: GeoJson = body.parse()?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(DatasetError::NotFeatureCollection);
    };

    let mut entries = Vec::with_capacity(collection.features.len());

    for (i, feature) in collection.features.into_iter().enumerate() {
        let Some(area_id) = feature.property(key_property).and_then(property_key) else {
            log::warn!("Skipping feature {i}: no '{key_property}' property");
            continue;
        };

        let Some(polygon) = feature.geometry.and_then(to_multipolygon) else {
            log::warn!("Skipping feature {i} ({area_id}): geometry is not polygonal");
            continue;
        };

        entries.push(AreaGeometry { area_id, polygon });
    }

    Ok(GeometrySet::from_entries(entries))
}

fn property_key(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.trim().to_owned()).filter(|s| !s.is_empty()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"DESA_1": "CIBATU"},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]]}},
            {"type": "Feature", "properties": {"DESA_1": "MARGASARI"},
             "geometry": {"type": "MultiPolygon", "coordinates": [[[[4,0],[6,0],[6,2],[4,2],[4,0]]]]}},
            {"type": "Feature", "properties": {"DESA_1": "CIBATU"},
             "geometry": {"type": "Polygon", "coordinates": [[[10,10],[11,10],[11,11],[10,11],[10,10]]]}},
            {"type": "Feature", "properties": {"NAME": "NO KEY"},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}},
            {"type": "Feature", "properties": {"DESA_1": "POINTY"},
             "geometry": {"type": "Point", "coordinates": [1,1]}},
            {"type": "Feature", "properties": {"DESA_1": 3214},
             "geometry": {"type": "Polygon", "coordinates": [[[0,5],[1,5],[1,6],[0,5]]]}}
        ]
    }"#;

    #[test]
    fn loads_and_merges_polygons() {
        let set = load_geometry(GEOJSON.as_bytes(), "DESA_1").unwrap();
        assert_eq!(set.len(), 3);

        let ids: Vec<&str> = set.entries().iter().map(|e| e.area_id.as_str()).collect();
        assert_eq!(ids, ["CIBATU", "MARGASARI", "3214"]);

        assert_eq!(set.get("CIBATU").unwrap().polygon.0.len(), 2);
        assert_eq!(set.get("MARGASARI").unwrap().polygon.0.len(), 1);
        assert!(!set.contains("POINTY"));
    }

    #[test]
    fn rejects_non_collections() {
        let single = r#"{"type": "Point", "coordinates": [1, 1]}"#;
        let err = load_geometry(single.as_bytes(), "DESA_1").unwrap_err();
        assert!(matches!(err, DatasetError::NotFeatureCollection));
    }

    #[test]
    fn rejects_invalid_json() {
        let err = load_geometry("{not json".as_bytes(), "DESA_1").unwrap_err();
        assert!(matches!(err, DatasetError::GeoJson(_)));
    }
}
