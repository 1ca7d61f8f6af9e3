//! # Open Transit
//!
//! Geometry core for tracking transit lines, their directional routes and the GPS
//! trips recorded while riding them.
//!
//! This library provides:
//! - Validated coordinate types ([`GeoPoint`], [`Path`]) in WGS84 longitude/latitude order
//! - Lossless conversion between coordinate arrays, EWKT/EWKB and GeoJSON ([`codec`])
//! - Proximity search for routes passing near a point ([`proximity`])
//! - Trip path aggregation for completed recording sessions ([`aggregate`])
//! - A storage-agnostic service layer for lines, routes and recordings ([`service`])
//!
//! ## Quick Start
//!
//! ```rust
//! use open_transit::{codec, path_builder, GeoPoint};
//!
//! // Raw input is always [longitude, latitude]
//! let raw = vec![vec![13.4050, 52.5200], vec![13.4100, 52.5230]];
//!
//! let wire = path_builder::build_path(&raw).unwrap();
//! assert_eq!(wire, "SRID=4326;LINESTRING(13.405 52.52, 13.41 52.523)");
//!
//! let path = codec::decode_path(codec::WireGeometry::Text(&wire)).unwrap().unwrap();
//! assert_eq!(path.first(), GeoPoint::new(13.4050, 52.5200).unwrap());
//! ```

use geo::{Coord, LineString};
use serde::{Deserialize, Serialize};

pub mod aggregate;
pub mod codec;
pub mod config;
pub mod error;
pub mod geo_utils;
pub mod models;
pub mod path_builder;
pub mod proximity;
pub mod service;
pub mod store;
pub mod validate;

pub use aggregate::{OrderedProjection, TripPathAggregator};
pub use codec::{decode_wire, encode_wkt, to_geojson, WireGeometry};
pub use config::Config;
pub use error::{
    Error, GeometryDecodeError, NotFoundError, Result, ValidationError, ValidationErrors,
};
pub use path_builder::{build_path, PathUpdate};
pub use proximity::{find_within, ProximityIndex};
pub use service::TransitService;
pub use store::{MemoryStore, Store};
pub use validate::{validate_path_points, validate_point};

/// Spatial reference identifier of WGS84, the only frame geometries are persisted in.
pub const SRID_WGS84: i32 = 4326;

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 position, longitude first.
///
/// Values are range-checked on construction, so every `GeoPoint` in circulation
/// is a legal coordinate.
///
/// # Example
/// ```
/// use open_transit::GeoPoint;
///
/// let berlin = GeoPoint::new(13.4050, 52.5200).unwrap();
/// assert_eq!(berlin.longitude(), 13.4050);
///
/// // Latitude 95 is out of range
/// assert!(GeoPoint::new(10.0, 95.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f64; 2]", try_from = "[f64; 2]")]
pub struct GeoPoint {
    longitude: f64,
    latitude: f64,
}

impl GeoPoint {
    /// Create a point from a longitude and a latitude, in that order.
    pub fn new(longitude: f64, latitude: f64) -> std::result::Result<Self, ValidationError> {
        validate::validate_point(longitude, latitude)
    }

    /// Only for values that already passed [`validate::validate_point`].
    pub(crate) fn from_validated(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// `[longitude, latitude]`, the canonical wire order.
    pub fn to_array(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    pub fn to_coord(&self) -> Coord {
        Coord { x: self.longitude, y: self.latitude }
    }
}

impl From<GeoPoint> for [f64; 2] {
    fn from(point: GeoPoint) -> Self {
        point.to_array()
    }
}

impl TryFrom<[f64; 2]> for GeoPoint {
    type Error = ValidationError;

    fn try_from([longitude, latitude]: [f64; 2]) -> std::result::Result<Self, Self::Error> {
        GeoPoint::new(longitude, latitude)
    }
}

/// An ordered polyline of at least two points.
///
/// Order encodes the direction of travel. A `Path` cannot be edited in place;
/// updates replace it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<[f64; 2]>", try_from = "Vec<[f64; 2]>")]
pub struct Path {
    points: Vec<GeoPoint>,
}

impl Path {
    /// Minimum number of vertices in a path.
    pub const MIN_POINTS: usize = 2;

    /// Build a path from already validated points.
    ///
    /// Fails with [`ValidationError::InsufficientVertices`] for fewer than two points.
    pub fn new(points: Vec<GeoPoint>) -> std::result::Result<Self, ValidationError> {
        if points.len() < Self::MIN_POINTS {
            return Err(ValidationError::InsufficientVertices {
                count: points.len(),
                min: Self::MIN_POINTS,
            });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false, kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> GeoPoint {
        self.points[0]
    }

    pub fn last(&self) -> GeoPoint {
        self.points[self.points.len() - 1]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GeoPoint> {
        self.points.iter()
    }

    /// Coordinate array form, `[[lon, lat], ...]`.
    pub fn to_coords(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(GeoPoint::to_array).collect()
    }

    pub fn to_line_string(&self) -> LineString {
        LineString::new(self.points.iter().map(GeoPoint::to_coord).collect())
    }

    pub fn bounds(&self) -> Bounds {
        geo_utils::compute_bounds(&self.points)
    }

    /// Great-circle length in meters.
    pub fn length_meters(&self) -> f64 {
        geo_utils::polyline_length(&self.points)
    }
}

impl From<Path> for Vec<[f64; 2]> {
    fn from(path: Path) -> Self {
        path.to_coords()
    }
}

impl TryFrom<Vec<[f64; 2]>> for Path {
    type Error = ValidationErrors;

    fn try_from(raw: Vec<[f64; 2]>) -> std::result::Result<Self, Self::Error> {
        validate::validate_path_points(&raw)
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a GeoPoint;
    type IntoIter = std::slice::Iter<'a, GeoPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// A stored geometry value, resolved once at the storage boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Empty,
    Point(GeoPoint),
    Line(Path),
}

impl Geometry {
    pub fn is_empty(&self) -> bool {
        matches!(self, Geometry::Empty)
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Geometry::Line(path) => Some(path),
            _ => None,
        }
    }

    /// Coordinates in wire order. A point yields a single pair.
    pub fn to_coords(&self) -> Vec<[f64; 2]> {
        match self {
            Geometry::Empty => Vec::new(),
            Geometry::Point(point) => vec![point.to_array()],
            Geometry::Line(path) => path.to_coords(),
        }
    }
}

impl From<Option<Path>> for Geometry {
    fn from(path: Option<Path>) -> Self {
        path.map_or(Geometry::Empty, Geometry::Line)
    }
}

/// Bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points. `None` for empty input.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        Some(geo_utils::compute_bounds(points))
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::from_validated(
            (self.min_lng + self.max_lng) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    /// Whether `point` lies inside the box grown by `buffer_meters` on every side.
    ///
    /// The buffer is in Web Mercator meters (see [`geo_utils::meters_to_degrees`]),
    /// and latitudes are clamped to the projection's limit as
    /// [`geo_utils::to_web_mercator`] does, so the test never rejects a point
    /// within that planar distance of the box.
    pub fn contains_with_buffer(&self, point: &GeoPoint, buffer_meters: f64) -> bool {
        let clamp = |lat: f64| {
            lat.clamp(-geo_utils::WEB_MERCATOR_MAX_LATITUDE, geo_utils::WEB_MERCATOR_MAX_LATITUDE)
        };
        let buffer_deg = geo_utils::meters_to_degrees(buffer_meters, point.latitude());
        let lat = clamp(point.latitude());
        lat >= clamp(self.min_lat) - buffer_deg
            && lat <= clamp(self.max_lat) + buffer_deg
            && point.longitude() >= self.min_lng - buffer_deg
            && point.longitude() <= self.max_lng + buffer_deg
    }
}

// ============================================================================
// Tests
// ============================================================================
