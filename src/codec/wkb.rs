//! EWKB, the binary wire format spatial databases store and return.
//!
//! Layout of a 2D geometry with SRID:
//!
//! ```text
//! byte order (1) | type | 0x20000000 (4) | srid (4) | body
//! ```
//!
//! where the body of a point is two `f64` and the body of a line string is a
//! `u32` point count followed by that many `f64` pairs. Either byte order is
//! read; little endian is written.

use std::io::{Cursor, Write};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::GeometryDecodeError;
use crate::validate::{validate_pair, validate_path_points};
use crate::{GeoPoint, Geometry, SRID_WGS84};

const EWKB_Z_FLAG: u32 = 0x8000_0000;
const EWKB_M_FLAG: u32 = 0x4000_0000;
const EWKB_SRID_FLAG: u32 = 0x2000_0000;
const EWKB_TYPE_MASK: u32 = 0x0FFF_FFFF;

const COORD_BYTES: u64 = 16;

/// Byte order marker at the start of every WKB geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    BigEndian,
    LittleEndian,
}

impl TryFrom<u8> for Endianness {
    type Error = GeometryDecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Endianness::BigEndian),
            1 => Ok(Endianness::LittleEndian),
            other => Err(GeometryDecodeError::Malformed(format!(
                "invalid byte order marker {}",
                other
            ))),
        }
    }
}

impl From<Endianness> for u8 {
    fn from(value: Endianness) -> Self {
        match value {
            Endianness::BigEndian => 0,
            Endianness::LittleEndian => 1,
        }
    }
}

/// Base geometry type codes shared by WKB and EWKB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WkbType {
    Point,
    LineString,
    Other(&'static str),
}

impl WkbType {
    fn from_code(code: u32) -> Result<Self, GeometryDecodeError> {
        match code {
            1 => Ok(WkbType::Point),
            2 => Ok(WkbType::LineString),
            3 => Ok(WkbType::Other("POLYGON")),
            4 => Ok(WkbType::Other("MULTIPOINT")),
            5 => Ok(WkbType::Other("MULTILINESTRING")),
            6 => Ok(WkbType::Other("MULTIPOLYGON")),
            7 => Ok(WkbType::Other("GEOMETRYCOLLECTION")),
            1001..=1007 | 2001..=2007 | 3001..=3007 => Ok(WkbType::Other("ISO WKB with Z/M")),
            other => Err(GeometryDecodeError::Malformed(format!(
                "unknown WKB geometry type {}",
                other
            ))),
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode EWKB (or plain WKB, taken as SRID 4326).
pub fn decode_ewkb(bytes: &[u8]) -> Result<Geometry, GeometryDecodeError> {
    let mut reader = Cursor::new(bytes);
    let byte_order = Endianness::try_from(reader.read_u8()?)?;

    let geometry = match byte_order {
        Endianness::BigEndian => read_geometry::<BigEndian>(&mut reader)?,
        Endianness::LittleEndian => read_geometry::<LittleEndian>(&mut reader)?,
    };

    if reader.position() != bytes.len() as u64 {
        return Err(GeometryDecodeError::Malformed(format!(
            "{} trailing bytes after geometry",
            bytes.len() as u64 - reader.position()
        )));
    }
    Ok(geometry)
}

fn read_geometry<B: ByteOrder>(
    reader: &mut Cursor<&[u8]>,
) -> Result<Geometry, GeometryDecodeError> {
    let raw_type = reader.read_u32::<B>()?;

    if raw_type & (EWKB_Z_FLAG | EWKB_M_FLAG) != 0 {
        return Err(GeometryDecodeError::UnsupportedGeometry(
            "EWKB with Z/M dimension".to_string(),
        ));
    }
    if raw_type & EWKB_SRID_FLAG != 0 {
        let srid = reader.read_i32::<B>()?;
        if srid != SRID_WGS84 {
            return Err(GeometryDecodeError::UnsupportedSrid(srid));
        }
    }

    match WkbType::from_code(raw_type & EWKB_TYPE_MASK)? {
        WkbType::Point => {
            let x = reader.read_f64::<B>()?;
            let y = reader.read_f64::<B>()?;
            // POINT EMPTY is encoded as NaN NaN
            if x.is_nan() && y.is_nan() {
                return Ok(Geometry::Empty);
            }
            Ok(Geometry::Point(validate_pair(0, &[x, y])?))
        }
        WkbType::LineString => {
            let num_points = reader.read_u32::<B>()? as u64;
            let remaining = reader.get_ref().len() as u64 - reader.position();
            if num_points * COORD_BYTES > remaining {
                return Err(GeometryDecodeError::Malformed(format!(
                    "line string declares {} points but only {} bytes follow",
                    num_points, remaining
                )));
            }
            if num_points == 0 {
                return Ok(Geometry::Empty);
            }

            let mut coords = Vec::with_capacity(num_points as usize);
            for _ in 0..num_points {
                let x = reader.read_f64::<B>()?;
                let y = reader.read_f64::<B>()?;
                coords.push([x, y]);
            }
            Ok(Geometry::Line(validate_path_points(&coords)?))
        }
        WkbType::Other(name) => Err(GeometryDecodeError::UnsupportedGeometry(name.to_string())),
    }
}

// =============================================================================
// Encoding
// =============================================================================

fn write_coord<W: Write>(writer: &mut W, point: &GeoPoint) -> std::io::Result<()> {
    writer.write_f64::<LittleEndian>(point.longitude())?;
    writer.write_f64::<LittleEndian>(point.latitude())
}

/// Write a geometry as little endian EWKB with SRID 4326.
///
/// [`Geometry::Empty`] is written as `LINESTRING EMPTY`.
pub fn write_ewkb<W: Write>(writer: &mut W, geometry: &Geometry) -> std::io::Result<()> {
    writer.write_u8(Endianness::LittleEndian.into())?;
    let base_type = match geometry {
        Geometry::Point(_) => 1,
        Geometry::Line(_) | Geometry::Empty => 2,
    };
    writer.write_u32::<LittleEndian>(base_type | EWKB_SRID_FLAG)?;
    writer.write_i32::<LittleEndian>(SRID_WGS84)?;

    match geometry {
        Geometry::Empty => writer.write_u32::<LittleEndian>(0),
        Geometry::Point(point) => write_coord(writer, point),
        Geometry::Line(path) => {
            let num_points = u32::try_from(path.len()).map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "too many points for WKB")
            })?;
            writer.write_u32::<LittleEndian>(num_points)?;
            for point in path {
                write_coord(writer, point)?;
            }
            Ok(())
        }
    }
}

/// Encode a geometry as EWKB bytes.
pub fn encode_ewkb(geometry: &Geometry) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ewkb_size(geometry));
    // Writes into a Vec only fail on paths longer than u32::MAX points, which
    // cannot be allocated in the first place.
    let _ = write_ewkb(&mut buf, geometry);
    buf
}

/// The byte length of a geometry encoded by [`write_ewkb`].
pub fn ewkb_size(geometry: &Geometry) -> usize {
    let header = 1 + 4 + 4;
    match geometry {
        Geometry::Empty => header + 4,
        Geometry::Point(_) => header + 16,
        Geometry::Line(path) => header + 4 + 16 * path.len(),
    }
}

// =============================================================================
// Hex Text Form
// =============================================================================

pub(crate) fn looks_like_hex(text: &str) -> bool {
    !text.is_empty() && text.len() % 2 == 0 && text.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Decode hex-encoded EWKB, the text form of a geometry column.
pub fn decode_hex_ewkb(hex: &str) -> Result<Geometry, GeometryDecodeError> {
    let hex = hex.trim();
    if !looks_like_hex(hex) {
        return Err(GeometryDecodeError::Malformed("not a hex string".to_string()));
    }
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|e| GeometryDecodeError::Malformed(e.to_string()))?;
    decode_ewkb(&bytes)
}

/// Encode a geometry as upper-case hex EWKB.
pub fn encode_hex_ewkb(geometry: &Geometry) -> String {
    use std::fmt::Write as _;

    let bytes = encode_ewkb(geometry);
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02X}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate_path_points;

    // SELECT ST_AsHEXEWKB('SRID=4326;POINT(1 2)'::geometry)
    const POINT_1_2_HEX: &str = "0101000020E6100000000000000000F03F0000000000000040";

    // SELECT ST_AsHEXEWKB('SRID=4326;LINESTRING(0 0,1 1)'::geometry)
    const LINE_HEX: &str =
        "0102000020E61000000200000000000000000000000000000000000000000000000000F03F000000000000F03F";

    #[test]
    fn test_decode_known_point() {
        let g = decode_hex_ewkb(POINT_1_2_HEX).unwrap();
        assert_eq!(g, Geometry::Point(GeoPoint::new(1.0, 2.0).unwrap()));
    }

    #[test]
    fn test_decode_known_line() {
        let g = decode_hex_ewkb(LINE_HEX).unwrap();
        assert_eq!(g.to_coords(), vec![[0.0, 0.0], [1.0, 1.0]]);
    }

    #[test]
    fn test_encode_matches_database_hex() {
        let point = Geometry::Point(GeoPoint::new(1.0, 2.0).unwrap());
        assert_eq!(encode_hex_ewkb(&point), POINT_1_2_HEX);

        let line = Geometry::Line(validate_path_points(&[[0.0, 0.0], [1.0, 1.0]]).unwrap());
        assert_eq!(encode_hex_ewkb(&line), LINE_HEX);
        assert_eq!(encode_ewkb(&line).len(), ewkb_size(&line));
    }

    #[test]
    fn test_decode_big_endian_plain_wkb() {
        // Plain WKB, big endian, POINT(1 2)
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&1.0f64.to_be_bytes());
        bytes.extend_from_slice(&2.0f64.to_be_bytes());
        let g = decode_ewkb(&bytes).unwrap();
        assert_eq!(g.to_coords(), vec![[1.0, 2.0]]);
    }

    #[test]
    fn test_decode_empty_forms() {
        assert_eq!(decode_ewkb(&encode_ewkb(&Geometry::Empty)).unwrap(), Geometry::Empty);

        let mut nan_point = vec![1u8];
        nan_point.extend_from_slice(&1u32.to_le_bytes());
        nan_point.extend_from_slice(&f64::NAN.to_le_bytes());
        nan_point.extend_from_slice(&f64::NAN.to_le_bytes());
        assert_eq!(decode_ewkb(&nan_point).unwrap(), Geometry::Empty);
    }

    #[test]
    fn test_decode_rejects_polygon() {
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            decode_ewkb(&bytes),
            Err(GeometryDecodeError::UnsupportedGeometry(_))
        ));
    }

    #[test]
    fn test_decode_rejects_other_srid() {
        // SRID=3857;POINT(1 2)
        let hex = "0101000020110F0000000000000000F03F0000000000000040";
        assert!(matches!(
            decode_hex_ewkb(hex),
            Err(GeometryDecodeError::UnsupportedSrid(3857))
        ));
    }

    #[test]
    fn test_decode_rejects_z() {
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&(1u32 | EWKB_Z_FLAG).to_le_bytes());
        assert!(matches!(
            decode_ewkb(&bytes),
            Err(GeometryDecodeError::UnsupportedGeometry(_))
        ));
    }

    #[test]
    fn test_decode_truncated_and_trailing() {
        let full = encode_ewkb(&Geometry::Point(GeoPoint::new(1.0, 2.0).unwrap()));
        assert!(matches!(
            decode_ewkb(&full[..full.len() - 3]),
            Err(GeometryDecodeError::Truncated(_))
        ));

        let mut padded = full.clone();
        padded.push(0);
        assert!(matches!(decode_ewkb(&padded), Err(GeometryDecodeError::Malformed(_))));

        assert!(matches!(decode_ewkb(&[]), Err(GeometryDecodeError::Truncated(_))));
    }

    #[test]
    fn test_decode_line_count_overflow() {
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&1_000_000u32.to_le_bytes());
        assert!(matches!(decode_ewkb(&bytes), Err(GeometryDecodeError::Malformed(_))));
    }

    #[test]
    fn test_hex_detection() {
        assert!(looks_like_hex("0101"));
        assert!(!looks_like_hex("010"));
        assert!(!looks_like_hex("POINT(0 0)"));
        assert!(!looks_like_hex(""));
    }
}
