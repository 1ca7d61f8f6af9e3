//! # Geographic Utilities
//!
//! Core geographic computations shared by the codec, the proximity search and the
//! trip aggregator.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two points |
//! | [`polyline_length`] | Total great-circle length of a polyline in meters |
//! | [`compute_bounds`] | Bounding box of a set of points |
//! | [`meters_to_degrees`] | Convert Web Mercator meters to degrees at a latitude |
//! | [`to_web_mercator`] | Project a point onto the Web Mercator plane (EPSG:3857) |
//! | [`point_segment_distance`] | Planar distance from a point to a line segment |
//! | [`point_polyline_distance`] | Planar distance from a point to a projected polyline |
//!
//! ## Example
//!
//! ```rust
//! use open_transit::{geo_utils, GeoPoint};
//!
//! let london = GeoPoint::new(-0.1278, 51.5074).unwrap();
//! let paris = GeoPoint::new(2.3522, 48.8566).unwrap();
//!
//! let dist = geo_utils::haversine_distance(&london, &paris);
//! assert!((dist - 343_560.0).abs() < 1000.0); // ~344 km
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Web Mercator
//!
//! Proximity search measures distance on the spherical Web Mercator plane, the
//! same projection a spatial database uses for `ST_Transform(geom, 3857)`. The
//! projection is conformal but stretches distances by `1 / cos(latitude)`, so a
//! planar meter equals a ground meter only at the equator. That error is accepted
//! for radii of a few kilometers at temperate latitudes; use
//! [`haversine_distance`] where exact ground distance matters.
//!
//! Latitudes beyond ±85.0511° (the projection's square-world limit) are clamped
//! to it, since the poles map to infinity.

use geo::{Coord, Distance, Haversine, Point};

use crate::{Bounds, GeoPoint};

/// WGS84 semi-major axis, the sphere radius used by EPSG:3857.
pub const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

/// Latitude at which Web Mercator maps the world to a square.
pub const WEB_MERCATOR_MAX_LATITUDE: f64 = 85.051_128_779_806_59;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two points using the Haversine formula.
///
/// Returns the distance in meters along the Earth's surface (assuming a spherical Earth
/// with radius 6,371 km).
#[inline]
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.longitude(), p1.latitude());
    let point2 = Point::new(p2.longitude(), p2.latitude());
    Haversine::distance(point1, point2)
}

/// Calculate the total length of a polyline in meters.
///
/// Sums the haversine distance between consecutive points. Empty or single-point
/// input returns 0.0.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Web Mercator meters per degree of longitude, the same at every latitude.
pub const MERCATOR_METERS_PER_DEGREE: f64 = WEB_MERCATOR_RADIUS * std::f64::consts::PI / 180.0;

/// Convert Web Mercator meters to approximate degrees at a given latitude.
///
/// Returns a single value suitable for bounding box expansion where a square
/// search area is acceptable. It never undershoots the planar distance that
/// [`point_segment_distance`] measures after [`to_web_mercator`]:
///
/// - longitude: one degree is [`MERCATOR_METERS_PER_DEGREE`] planar meters
///   everywhere, and dividing by `cos(latitude)` only widens the result;
/// - latitude: one degree projects to at least that many meters, more away
///   from the equator.
///
/// The `cos` factor is floored at 0.1 so polar queries stay bounded.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let meters_per_degree = MERCATOR_METERS_PER_DEGREE * lat_rad.cos().max(0.1);
    meters / meters_per_degree
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box of a set of points.
///
/// For empty input, returns a bounds with MIN/MAX values that contain nothing.
pub fn compute_bounds(points: &[GeoPoint]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude());
        max_lat = max_lat.max(p.latitude());
        min_lng = min_lng.min(p.longitude());
        max_lng = max_lng.max(p.longitude());
    }

    Bounds { min_lat, max_lat, min_lng, max_lng }
}

// =============================================================================
// Planar Projection
// =============================================================================

/// Project a WGS84 point to Web Mercator meters.
///
/// ```rust
/// use open_transit::{geo_utils, GeoPoint};
///
/// let origin = geo_utils::to_web_mercator(&GeoPoint::new(0.0, 0.0).unwrap());
/// assert_eq!(origin.x, 0.0);
/// assert!(origin.y.abs() < 1e-6);
/// ```
#[inline]
pub fn to_web_mercator(point: &GeoPoint) -> Coord {
    let lat = point
        .latitude()
        .clamp(-WEB_MERCATOR_MAX_LATITUDE, WEB_MERCATOR_MAX_LATITUDE);
    let x = WEB_MERCATOR_RADIUS * point.longitude().to_radians();
    let y = WEB_MERCATOR_RADIUS
        * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    Coord { x, y }
}

/// Project every vertex of a polyline, keeping order.
pub fn project_polyline(points: &[GeoPoint]) -> Vec<Coord> {
    points.iter().map(to_web_mercator).collect()
}

/// Euclidean distance from `p` to the segment `a`-`b`.
///
/// Measures to the nearest point along the segment, not just its endpoints.
/// A degenerate segment (`a == b`) is treated as a point.
pub fn point_segment_distance(p: Coord, a: Coord, b: Coord) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_2 = dx * dx + dy * dy;

    let t = if len_2 == 0.0 {
        0.0
    } else {
        ((p.x - a.x) * dx + (p.y - a.y) * dy) / len_2
    };

    // Endpoints are used as-is so a query on a vertex measures exactly zero
    if t <= 0.0 {
        return ((p.x - a.x).powi(2) + (p.y - a.y).powi(2)).sqrt();
    }
    if t >= 1.0 {
        return ((p.x - b.x).powi(2) + (p.y - b.y).powi(2)).sqrt();
    }
    // Perpendicular distance from the cross product: zero for collinear points
    (dx * (p.y - a.y) - dy * (p.x - a.x)).abs() / len_2.sqrt()
}

/// Minimum Euclidean distance from `p` to any segment of a projected polyline.
///
/// `f64::INFINITY` for an empty polyline.
pub fn point_polyline_distance(p: Coord, polyline: &[Coord]) -> f64 {
    match polyline {
        [] => f64::INFINITY,
        [only] => point_segment_distance(p, *only, *only),
        _ => polyline
            .windows(2)
            .map(|w| point_segment_distance(p, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pt(lon: f64, lat: f64) -> GeoPoint {
        GeoPoint::new(lon, lat).unwrap()
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = pt(-0.1278, 51.5074);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_known_value() {
        // London to Paris is approximately 344 km
        let dist = haversine_distance(&pt(-0.1278, 51.5074), &pt(2.3522, 48.8566));
        assert!((dist - 343_560.0).abs() < 5000.0);
    }

    #[test]
    fn test_polyline_length() {
        assert_eq!(polyline_length(&[]), 0.0);
        assert_eq!(polyline_length(&[pt(0.0, 0.0)]), 0.0);

        // One degree of latitude is ~111 km
        let length = polyline_length(&[pt(0.0, 0.0), pt(0.0, 0.5), pt(0.0, 1.0)]);
        assert!((length - 111_195.0).abs() < 500.0);
    }

    #[test]
    fn test_compute_bounds() {
        let bounds = compute_bounds(&[pt(-0.13, 51.50), pt(-0.12, 51.51), pt(-0.125, 51.505)]);
        assert_eq!(bounds.min_lat, 51.50);
        assert_eq!(bounds.max_lat, 51.51);
        assert_eq!(bounds.min_lng, -0.13);
        assert_eq!(bounds.max_lng, -0.12);
    }

    #[test]
    fn test_meters_to_degrees() {
        let one_degree = MERCATOR_METERS_PER_DEGREE;
        assert_relative_eq!(meters_to_degrees(one_degree, 0.0), 1.0, epsilon = 1e-12);
        assert!(meters_to_degrees(MERCATOR_METERS_PER_DEGREE, 45.0) > 1.0);
        // Floored near the poles
        assert_relative_eq!(
            meters_to_degrees(MERCATOR_METERS_PER_DEGREE / 10.0, 90.0),
            1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_meters_to_degrees_covers_projected_distance() {
        // A point 1 km east of the origin on the Mercator plane
        let lon = 1000.0 / MERCATOR_METERS_PER_DEGREE;
        let x = to_web_mercator(&pt(lon, 0.0)).x;
        assert_relative_eq!(x, 1000.0, epsilon = 1e-6);
        assert!(meters_to_degrees(1000.0, 0.0) >= lon);

        // Away from the equator a degree of latitude projects longer still
        let north = to_web_mercator(&pt(0.0, 61.0)).y - to_web_mercator(&pt(0.0, 60.0)).y;
        assert!(north > MERCATOR_METERS_PER_DEGREE);
    }

    #[test]
    fn test_web_mercator_known_values() {
        let c = to_web_mercator(&pt(180.0, 0.0));
        assert_relative_eq!(c.x, 20_037_508.342_789_244, epsilon = 1e-6);
        assert_relative_eq!(c.y, 0.0, epsilon = 1e-6);

        let c = to_web_mercator(&pt(0.0, WEB_MERCATOR_MAX_LATITUDE));
        assert_relative_eq!(c.y, 20_037_508.342_789_244, epsilon = 1e-3);
    }

    #[test]
    fn test_web_mercator_clamps_poles() {
        let c = to_web_mercator(&pt(0.0, 90.0));
        assert!(c.y.is_finite());
        assert_eq!(c, to_web_mercator(&pt(0.0, WEB_MERCATOR_MAX_LATITUDE)));
    }

    #[test]
    fn test_point_segment_distance_interior_and_ends() {
        let a = Coord { x: 0.0, y: 0.0 };
        let b = Coord { x: 10.0, y: 0.0 };
        // Perpendicular foot inside the segment
        assert_relative_eq!(point_segment_distance(Coord { x: 5.0, y: 3.0 }, a, b), 3.0);
        // Beyond the end, measured to the endpoint
        assert_relative_eq!(point_segment_distance(Coord { x: 13.0, y: 4.0 }, a, b), 5.0);
        // Degenerate segment
        assert_relative_eq!(point_segment_distance(Coord { x: 3.0, y: 4.0 }, a, a), 5.0);
    }

    #[test]
    fn test_point_segment_distance_on_segment_is_zero() {
        let a = to_web_mercator(&pt(0.0, 0.0));
        let b = to_web_mercator(&pt(0.0, 1.0));
        let mid = to_web_mercator(&pt(0.0, 0.5));
        assert_eq!(point_segment_distance(mid, a, b), 0.0);
    }

    #[test]
    fn test_point_polyline_distance_uses_nearest_segment() {
        let polyline = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 10.0, y: 0.0 },
            Coord { x: 10.0, y: 10.0 },
        ];
        assert_relative_eq!(point_polyline_distance(Coord { x: 12.0, y: 5.0 }, &polyline), 2.0);
        assert_eq!(point_polyline_distance(Coord { x: 0.0, y: 0.0 }, &[]), f64::INFINITY);
    }
}
