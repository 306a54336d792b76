//! R-tree point-in-polygon index over area boundaries.
//!
//! Answers "which village is under the cursor" for map hover and click.

use geo::{Area as _, BoundingRect as _, Contains as _, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};

/// A boundary stored in the R-tree with its key.
struct AreaEntry {
    area_id: String,
    area: f64,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for AreaEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Spatial index of area polygons.
pub struct AreaIndex {
    tree: RTree<AreaEntry>,
}

impl AreaIndex {
    /// Bulk-loads `(area_id, polygon)` pairs. Empty polygons are skipped.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = (String, MultiPolygon<f64>)>) -> Self {
        let entries: Vec<AreaEntry> = entries
            .into_iter()
            .filter_map(|(area_id, polygon)| {
                let Some(envelope) = compute_envelope(&polygon) else {
                    log::warn!("Skipping empty polygon for area {area_id}");
                    return None;
                };
                Some(AreaEntry {
                    area_id,
                    area: polygon.unsigned_area(),
                    envelope,
                    polygon,
                })
            })
            .collect();

        log::debug!("Indexed {} area polygons", entries.len());

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed polygons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Area containing the point.
    ///
    /// Village boundaries can overlap along digitizing seams; the smallest
    /// containing polygon wins.
    #[must_use]
    pub fn lookup(&self, lng: f64, lat: f64) -> Option<&str> {
        let point = geo::Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        let mut best: Option<&AreaEntry> = None;

        for entry in self.tree.locate_in_envelope_intersecting(&query_env) {
            if entry.polygon.contains(&point) {
                match best {
                    None => best = Some(entry),
                    Some(current) if entry.area < current.area => best = Some(entry),
                    _ => {}
                }
            }
        }

        best.map(|e| e.area_id.as_str())
    }
}

fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
