//! EWKT, the text wire format: `SRID=4326;LINESTRING(lon1 lat1, lon2 lat2, ...)`.
//!
//! Numbers are written with Rust's shortest round-trip formatting, so decoding
//! an encoded value gives back the identical `f64`.

use std::str::FromStr;

use wkt::types::{Coord, LineString, Point};
use wkt::Wkt;

use crate::error::GeometryDecodeError;
use crate::validate::{validate_pair, validate_path_points};
use crate::{GeoPoint, Geometry, Path, SRID_WGS84};

fn write_coord(out: &mut String, point: &GeoPoint) {
    use std::fmt::Write;
    // Writing into a String cannot fail.
    let _ = write!(out, "{} {}", point.longitude(), point.latitude());
}

/// `SRID=4326;LINESTRING(lon1 lat1, lon2 lat2, ...)`, longitude first.
///
/// ```rust
/// use open_transit::{codec, validate::validate_path_points};
///
/// let path = validate_path_points(&[[-0.1278, 51.5074], [-0.129, 51.508]]).unwrap();
/// assert_eq!(
///     codec::encode_wkt(&path),
///     "SRID=4326;LINESTRING(-0.1278 51.5074, -0.129 51.508)"
/// );
/// ```
pub fn encode_wkt(path: &Path) -> String {
    let mut out = format!("SRID={};LINESTRING(", SRID_WGS84);
    for (i, point) in path.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_coord(&mut out, point);
    }
    out.push(')');
    out
}

/// `SRID=4326;POINT(lon lat)`.
pub fn encode_point_wkt(point: &GeoPoint) -> String {
    let mut out = format!("SRID={};POINT(", SRID_WGS84);
    write_coord(&mut out, point);
    out.push(')');
    out
}

/// Wire text for a stored geometry value; `None` for [`Geometry::Empty`],
/// which is persisted as a null column.
pub fn encode_geometry_wkt(geometry: &Geometry) -> Option<String> {
    match geometry {
        Geometry::Empty => None,
        Geometry::Point(point) => Some(encode_point_wkt(point)),
        Geometry::Line(path) => Some(encode_wkt(path)),
    }
}

/// Strip an optional `SRID=n;` prefix. Anything other than 4326 is refused:
/// the codec never reprojects.
fn split_srid(text: &str) -> Result<&str, GeometryDecodeError> {
    let Some((prefix, body)) = text.split_once(';') else {
        return Ok(text);
    };
    let srid = prefix
        .trim()
        .strip_prefix("SRID=")
        .or_else(|| prefix.trim().strip_prefix("srid="))
        .ok_or_else(|| {
            GeometryDecodeError::Malformed(format!("bad SRID prefix {:?}", prefix))
        })?;
    let srid: i32 = srid
        .trim()
        .parse()
        .map_err(|_| GeometryDecodeError::Malformed(format!("bad SRID {:?}", srid)))?;
    if srid != SRID_WGS84 {
        return Err(GeometryDecodeError::UnsupportedSrid(srid));
    }
    Ok(body)
}

fn unsupported(kind: &str) -> GeometryDecodeError {
    GeometryDecodeError::UnsupportedGeometry(kind.to_string())
}

/// Z and M ordinates are refused rather than dropped.
fn planar(coord: &Coord<f64>, kind: &str) -> Result<[f64; 2], GeometryDecodeError> {
    if coord.z.is_some() || coord.m.is_some() {
        return Err(unsupported(&format!("{} with Z/M", kind)));
    }
    Ok([coord.x, coord.y])
}

/// Parse EWKT (or plain WKT, taken as SRID 4326).
///
/// Only 2D `POINT` and `LINESTRING` are accepted; `EMPTY` of either decodes to
/// [`Geometry::Empty`].
pub fn parse_ewkt(text: &str) -> Result<Geometry, GeometryDecodeError> {
    let body = split_srid(text.trim())?.trim();
    let parsed = Wkt::<f64>::from_str(body)
        .map_err(|e| GeometryDecodeError::Malformed(format!("{} in {:?}", e, body)))?;

    match parsed {
        Wkt::Point(Point(None)) => Ok(Geometry::Empty),
        Wkt::Point(Point(Some(coord))) => {
            let pair = planar(&coord, "POINT")?;
            Ok(Geometry::Point(validate_pair(0, &pair)?))
        }
        Wkt::LineString(LineString(coords)) if coords.is_empty() => Ok(Geometry::Empty),
        Wkt::LineString(LineString(coords)) => {
            let pairs = coords
                .iter()
                .map(|coord| planar(coord, "LINESTRING"))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Geometry::Line(validate_path_points(&pairs)?))
        }
        Wkt::Polygon(_) => Err(unsupported("POLYGON")),
        Wkt::MultiPoint(_) => Err(unsupported("MULTIPOINT")),
        Wkt::MultiLineString(_) => Err(unsupported("MULTILINESTRING")),
        Wkt::MultiPolygon(_) => Err(unsupported("MULTIPOLYGON")),
        Wkt::GeometryCollection(_) => Err(unsupported("GEOMETRYCOLLECTION")),
    }
}
