//! # Proximity Search
//!
//! Finds routes whose path passes within a radius of a query point.
//!
//! ## Algorithm
//! 1. Project every path vertex onto the Web Mercator plane (meters)
//! 2. Index each path's projected envelope in an R-tree
//! 3. Coarse stage: envelopes intersecting the query point's box grown by the radius
//! 4. Exact stage: minimum distance from the query to any segment of the path,
//!    kept iff `<= radius`
//!
//! Routes without a path never match. Result order carries no meaning.
//!
//! Distances are planar, see [`crate::geo_utils`] for the accuracy trade-off.

use geo::Coord;
use log::debug;
use rstar::{RTree, RTreeObject, AABB};

use crate::error::ValidationError;
use crate::geo_utils::{point_polyline_distance, project_polyline, to_web_mercator};
use crate::models::Route;
use crate::validate::check_range;
use crate::{GeoPoint, Path};

/// Projected envelope of one indexed path.
#[derive(Debug, Clone)]
struct PathEnvelope {
    slot: usize,
    min: [f64; 2],
    max: [f64; 2],
}

impl RTreeObject for PathEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

/// A route found near a query point.
#[derive(Debug, Clone, PartialEq)]
pub struct Nearby<K> {
    pub key: K,
    /// Planar distance in Web Mercator meters.
    pub distance: f64,
}

/// Spatial index over projected paths, keyed by caller-chosen ids.
#[derive(Debug)]
pub struct ProximityIndex<K> {
    tree: RTree<PathEnvelope>,
    entries: Vec<(K, Vec<Coord>)>,
}

impl<K: Clone> ProximityIndex<K> {
    /// Build an index. Candidates without a path are skipped.
    pub fn new<'a, I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<&'a Path>)>,
    {
        let entries: Vec<(K, Vec<Coord>)> = candidates
            .into_iter()
            .filter_map(|(key, path)| path.map(|p| (key, project_polyline(p.points()))))
            .collect();

        let envelopes: Vec<PathEnvelope> = entries
            .iter()
            .enumerate()
            .map(|(slot, (_, coords))| {
                let mut min = [f64::MAX, f64::MAX];
                let mut max = [f64::MIN, f64::MIN];
                for c in coords {
                    min = [min[0].min(c.x), min[1].min(c.y)];
                    max = [max[0].max(c.x), max[1].max(c.y)];
                }
                PathEnvelope { slot, min, max }
            })
            .collect();

        Self {
            tree: RTree::bulk_load(envelopes),
            entries,
        }
    }

    /// Number of indexed paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every indexed path within `radius_meters` of `query`, with its distance.
    ///
    /// Fails for a negative or non-finite radius.
    pub fn search(
        &self,
        query: &GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<Nearby<K>>, ValidationError> {
        let radius = check_range("radius_meters", radius_meters, 0.0, f64::MAX)?;
        let q = to_web_mercator(query);

        let search_box =
            AABB::from_corners([q.x - radius, q.y - radius], [q.x + radius, q.y + radius]);
        let mut coarse = 0usize;
        let found: Vec<Nearby<K>> = self
            .tree
            .locate_in_envelope_intersecting(&search_box)
            .filter_map(|envelope| {
                coarse += 1;
                let (key, coords) = &self.entries[envelope.slot];
                let distance = point_polyline_distance(q, coords);
                (distance <= radius).then(|| Nearby { key: key.clone(), distance })
            })
            .collect();

        debug!(
            "[Proximity] ({}, {}) r={}m: {} indexed, {} candidates, {} within",
            query.longitude(),
            query.latitude(),
            radius,
            self.entries.len(),
            coarse,
            found.len()
        );
        Ok(found)
    }

    /// Keys of every indexed path within `radius_meters` of `query`.
    pub fn find_within(
        &self,
        query: &GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<K>, ValidationError> {
        Ok(self
            .search(query, radius_meters)?
            .into_iter()
            .map(|n| n.key)
            .collect())
    }
}

/// Routes whose path passes within `radius_meters` of `query`.
///
/// ```rust
/// use open_transit::{find_within, GeoPoint};
/// use open_transit::models::Route;
/// use open_transit::validate::validate_path_points;
///
/// let mut route = Route::new(1, "northbound");
/// route.path = Some(validate_path_points(&[[0.0, 0.0], [0.0, 1.0]]).unwrap());
/// let routes = vec![route];
///
/// // ~556 m east of the line
/// let query = GeoPoint::new(0.005, 0.5).unwrap();
/// assert_eq!(find_within(&query, 1000.0, &routes).unwrap().len(), 1);
/// assert!(find_within(&query, 100.0, &routes).unwrap().is_empty());
/// ```
pub fn find_within<'a>(
    query: &GeoPoint,
    radius_meters: f64,
    candidates: &'a [Route],
) -> Result<Vec<&'a Route>, ValidationError> {
    let index = ProximityIndex::new(
        candidates
            .iter()
            .enumerate()
            .map(|(i, route)| (i, route.path.as_ref())),
    );
    let mut slots = index.find_within(query, radius_meters)?;
    slots.sort_unstable();
    Ok(slots.into_iter().map(|i| &candidates[i]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate_path_points;

    fn path(raw: &[[f64; 2]]) -> Path {
        validate_path_points(raw).unwrap()
    }

    fn route_with_path(id: i64, raw: &[[f64; 2]]) -> Route {
        let mut route = Route::new(1, "outbound");
        route.id = id;
        route.path = Some(path(raw));
        route
    }

    fn q(lon: f64, lat: f64) -> GeoPoint {
        GeoPoint::new(lon, lat).unwrap()
    }

    #[test]
    fn test_route_within_about_one_km() {
        let routes = vec![route_with_path(1, &[[0.0, 0.0], [0.0, 1.0]])];
        // 0.005 degrees of longitude at the equator is ~556 m
        let found = find_within(&q(0.005, 0.5), 1000.0, &routes).unwrap();
        assert_eq!(found.len(), 1);
        assert!(find_within(&q(0.005, 0.5), 1.0, &routes).unwrap().is_empty());
    }

    #[test]
    fn test_distance_measured_to_segment_not_vertex() {
        // Vertices are ~111 km apart, the query sits next to the middle of the segment
        let routes = vec![route_with_path(1, &[[0.0, 0.0], [0.0, 1.0]])];
        let found = find_within(&q(0.001, 0.5), 200.0, &routes).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_zero_radius_only_on_the_line() {
        let routes = vec![route_with_path(1, &[[0.0, 0.0], [0.0, 1.0]])];
        assert_eq!(find_within(&q(0.0, 1.0), 0.0, &routes).unwrap().len(), 1);
        assert_eq!(find_within(&q(0.0, 0.0), 0.0, &routes).unwrap().len(), 1);
        assert!(find_within(&q(0.0001, 0.5), 0.0, &routes).unwrap().is_empty());
    }

    #[test]
    fn test_query_at_segment_midpoint() {
        let routes = vec![route_with_path(1, &[[0.0, 0.0], [0.0, 1.0]])];
        assert_eq!(find_within(&q(0.0, 0.5), 1000.0, &routes).unwrap().len(), 1);
        // On the segment itself the distance is zero, so even radius 0 matches
        assert_eq!(find_within(&q(0.0, 0.5), 0.0, &routes).unwrap().len(), 1);
        assert!(find_within(&q(0.00001, 0.5), 0.001, &routes).unwrap().is_empty());
    }

    #[test]
    fn test_routes_without_path_excluded() {
        let mut pending = Route::new(1, "inbound");
        pending.id = 2;
        let routes = vec![pending, route_with_path(3, &[[0.0, 0.0], [0.0, 1.0]])];
        let found = find_within(&q(0.0, 0.5), 1_000_000.0, &routes).unwrap();
        assert_eq!(found.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_mixed_candidates() {
        let routes = vec![
            route_with_path(1, &[[13.40, 52.52], [13.42, 52.52]]),
            route_with_path(2, &[[13.40, 52.60], [13.42, 52.60]]),
            route_with_path(3, &[[-0.13, 51.50], [-0.12, 51.51]]),
        ];
        let found = find_within(&q(13.41, 52.521), 500.0, &routes).unwrap();
        assert_eq!(found.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_invalid_radius() {
        let routes = vec![route_with_path(1, &[[0.0, 0.0], [0.0, 1.0]])];
        let err = find_within(&q(0.0, 0.5), -1.0, &routes).unwrap_err();
        assert_eq!(err.field(), "radius_meters");
        assert!(find_within(&q(0.0, 0.5), f64::NAN, &routes).is_err());
    }

    #[test]
    fn test_index_reports_distance() {
        let p = path(&[[0.0, 0.0], [0.0, 1.0]]);
        let index = ProximityIndex::new(vec![("a", Some(&p)), ("b", None)]);
        assert_eq!(index.len(), 1);

        let hits = index.search(&q(0.001, 0.5), 1000.0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "a");
        // One thousandth of a degree on the Web Mercator plane
        assert!((hits[0].distance - 111.319).abs() < 0.01);
    }

    #[test]
    fn test_empty_index() {
        let index: ProximityIndex<u32> = ProximityIndex::new(Vec::new());
        assert!(index.is_empty());
        assert!(index.find_within(&q(0.0, 0.0), 10.0).unwrap().is_empty());
    }
}
