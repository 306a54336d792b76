//! `GeoJSON` rendering of a joined table.

use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, feature::Id};

use crate::JoinedTable;

fn feature(area_id: &str, polygon: &MultiPolygon<f64>, properties: JsonValue) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(polygon))),
        id: Some(Id::String(area_id.to_string())),
        properties: match properties {
            JsonValue::Object(map) => Some(map),
            _ => Some(JsonObject::new()),
        },
        foreign_members: None,
    }
}

impl JoinedTable {
    /// Renders every joined row (and background polygon) as a feature.
    ///
    /// Properties are `area_id`, `cluster`, `density_category`, and
    /// `population` for `year`. Background features carry `null` for all
    /// but `area_id`, as do cells that are missing for `year`.
    #[must_use]
    pub fn to_feature_collection(&self, year: i32) -> FeatureCollection {
        let joined = self.rows().iter().map(|row| {
            let a = &row.attributes;
            feature(
                &a.area_id,
                &row.polygon,
                serde_json::json!({
                    "area_id": a.area_id,
                    "cluster": a.cluster,
                    "density_category": a.density_category.to_string(),
                    "population": a.population(year),
                }),
            )
        });

        let background = self.background().iter().map(|b| {
            feature(
                &b.area_id,
                &b.polygon,
                serde_json::json!({
                    "area_id": b.area_id,
                    "cluster": null,
                    "density_category": null,
                    "population": null,
                }),
            )
        });

        FeatureCollection {
            bbox: None,
            features: joined.chain(background).collect(),
            foreign_members: None,
        }
    }

    /// [`Self::to_feature_collection`] serialized to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GeoJoinError::Json`] if serialization fails.
    pub fn to_geojson_string(&self, year: i32) -> Result<String, crate::GeoJoinError> {
        Ok(serde_json::to_string(&self.to_feature_collection(year))?)
    }
}
