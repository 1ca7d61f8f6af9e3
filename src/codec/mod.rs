//! # Geometry Codec
//!
//! Conversion between the three geometry representations the system deals in:
//!
//! | Representation | Used by | Module |
//! |----------------|---------|--------|
//! | `[[lon, lat], ...]` arrays | API callers | [`crate::Path`] (serde) |
//! | EWKT / EWKB | persistence | [`wkt`], [`wkb`] |
//! | GeoJSON Feature | map clients | [`geojson`] |
//!
//! Decoding never resamples, deduplicates or reprojects. Coordinates come back
//! in the order and precision they were stored with, and anything that is not a
//! 2D `POINT` or `LINESTRING` in SRID 4326 is an error.

pub mod geojson;
pub mod wkb;
pub mod wkt;

pub use self::geojson::{from_geojson, geometry_to_geojson, to_geojson};
pub use self::wkb::{decode_ewkb, decode_hex_ewkb, encode_ewkb, encode_hex_ewkb};
pub use self::wkt::{encode_geometry_wkt, encode_point_wkt, encode_wkt, parse_ewkt};

use crate::error::GeometryDecodeError;
use crate::{GeoPoint, Geometry, Path};

/// Geometry as handed over by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireGeometry<'a> {
    /// EWKT, or EWKB as a hex string (the text form spatial databases return).
    Text(&'a str),
    /// Raw EWKB bytes.
    Binary(&'a [u8]),
}

/// Decode a stored geometry.
///
/// Text input made only of hex digits is read as hex EWKB, anything else as EWKT.
pub fn decode_wire(wire: WireGeometry<'_>) -> Result<Geometry, GeometryDecodeError> {
    match wire {
        WireGeometry::Binary(bytes) => wkb::decode_ewkb(bytes),
        WireGeometry::Text(text) => {
            let text = text.trim();
            if wkb::looks_like_hex(text) {
                wkb::decode_hex_ewkb(text)
            } else {
                wkt::parse_ewkt(text)
            }
        }
    }
}

/// Decode a geometry stored in a `LINESTRING` column.
///
/// An empty geometry is `Ok(None)`; a point is an error.
pub fn decode_path(wire: WireGeometry<'_>) -> Result<Option<Path>, GeometryDecodeError> {
    match decode_wire(wire)? {
        Geometry::Empty => Ok(None),
        Geometry::Line(path) => Ok(Some(path)),
        Geometry::Point(_) => Err(GeometryDecodeError::UnsupportedGeometry(
            "POINT where LINESTRING was expected".to_string(),
        )),
    }
}

/// Decode a geometry stored in a `POINT` column.
pub fn decode_point(wire: WireGeometry<'_>) -> Result<Option<GeoPoint>, GeometryDecodeError> {
    match decode_wire(wire)? {
        Geometry::Empty => Ok(None),
        Geometry::Point(point) => Ok(Some(point)),
        Geometry::Line(_) => Err(GeometryDecodeError::UnsupportedGeometry(
            "LINESTRING where POINT was expected".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate_path_points;

    fn zigzag(n: usize) -> Path {
        let raw: Vec<[f64; 2]> = (0..n)
            .map(|i| {
                let t = i as f64;
                [
                    -179.9 + t * 0.359_713_1,
                    if i % 2 == 0 { -89.5 + t * 0.017_3 } else { 89.5 - t * 0.011_9 },
                ]
            })
            .collect();
        validate_path_points(&raw).unwrap()
    }

    fn assert_same_coords(a: &Path, b: &Path) {
        assert_eq!(a.len(), b.len());
        for (p, q) in a.iter().zip(b.iter()) {
            assert!((p.longitude() - q.longitude()).abs() < 1e-9);
            assert!((p.latitude() - q.latitude()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_wkt_round_trip_various_sizes() {
        for n in [2, 3, 17, 250, 1000] {
            let path = zigzag(n);
            let wire = encode_wkt(&path);
            let decoded = decode_path(WireGeometry::Text(&wire)).unwrap().unwrap();
            assert_same_coords(&path, &decoded);
        }
    }

    #[test]
    fn test_binary_and_hex_round_trip() {
        let path = zigzag(40);
        let geometry = Geometry::Line(path.clone());

        let bytes = encode_ewkb(&geometry);
        let decoded = decode_path(WireGeometry::Binary(&bytes)).unwrap().unwrap();
        assert_eq!(decoded, path);

        let hex = encode_hex_ewkb(&geometry);
        let decoded = decode_path(WireGeometry::Text(&hex)).unwrap().unwrap();
        assert_eq!(decoded, path);
    }

    #[test]
    fn test_decode_point_wire() {
        let point = GeoPoint::new(-73.9857, 40.7484).unwrap();
        let wire = encode_point_wkt(&point);
        assert_eq!(decode_point(WireGeometry::Text(&wire)).unwrap(), Some(point));
        assert!(decode_path(WireGeometry::Text(&wire)).is_err());
    }

    #[test]
    fn test_decode_rejects_polygon() {
        let err = decode_wire(WireGeometry::Text(
            "SRID=4326;POLYGON((0 0, 1 0, 1 1, 0 0))",
        ))
        .unwrap_err();
        assert!(matches!(err, GeometryDecodeError::UnsupportedGeometry(_)));
    }

    #[test]
    fn test_decode_empty_line() {
        assert_eq!(
            decode_path(WireGeometry::Text("SRID=4326;LINESTRING EMPTY")).unwrap(),
            None
        );
    }
}
