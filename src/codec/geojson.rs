//! GeoJSON rendering for map clients.
//!
//! Positions are `[lon, lat]`. Positions carrying altitude are refused on input
//! rather than truncated.

use ::geojson::{Feature, JsonObject, Value};

use crate::error::GeometryDecodeError;
use crate::validate::{validate_pair, validate_path_points};
use crate::{GeoPoint, Geometry, Path};

fn position(point: &GeoPoint) -> Vec<f64> {
    vec![point.longitude(), point.latitude()]
}

fn feature(geometry: Option<::geojson::Geometry>, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry,
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Render a path as a `LineString` Feature carrying the given properties.
///
/// ```rust
/// use open_transit::{codec, validate::validate_path_points};
///
/// let path = validate_path_points(&[[0.0, 0.0], [0.0, 1.0]]).unwrap();
/// let mut props = geojson::JsonObject::new();
/// props.insert("direction".to_string(), "outbound".into());
///
/// let feature = codec::to_geojson(&path, props);
/// let json = serde_json::to_value(&feature).unwrap();
/// assert_eq!(json["geometry"]["type"], "LineString");
/// assert_eq!(json["properties"]["direction"], "outbound");
/// ```
pub fn to_geojson(path: &Path, properties: JsonObject) -> Feature {
    let geometry = ::geojson::Geometry::new(line_string_value(path));
    feature(Some(geometry), properties)
}

/// Render a point as a `Point` Feature.
pub fn point_to_geojson(point: &GeoPoint, properties: JsonObject) -> Feature {
    let geometry = ::geojson::Geometry::new(Value::Point(position(point)));
    feature(Some(geometry), properties)
}

fn line_string_value(path: &Path) -> Value {
    Value::LineString(path.iter().map(position).collect())
}

/// GeoJSON geometry for a stored value; `None` for [`Geometry::Empty`].
pub fn geometry_to_geojson(geometry: &Geometry) -> Option<::geojson::Geometry> {
    let value = match geometry {
        Geometry::Empty => return None,
        Geometry::Point(point) => Value::Point(position(point)),
        Geometry::Line(path) => line_string_value(path),
    };
    Some(::geojson::Geometry::new(value))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

fn pair(index: usize, position: &[f64]) -> Result<GeoPoint, GeometryDecodeError> {
    if position.len() != 2 {
        return Err(GeometryDecodeError::Malformed(format!(
            "position {} has {} values, expected [lon, lat]",
            index,
            position.len()
        )));
    }
    Ok(validate_pair(index, position)?)
}

/// Read a GeoJSON `Point` or `LineString` geometry.
pub fn from_geojson(geometry: &::geojson::Geometry) -> Result<Geometry, GeometryDecodeError> {
    match &geometry.value {
        Value::Point(position) => Ok(Geometry::Point(pair(0, position)?)),
        Value::LineString(positions) => {
            if let Some((index, p)) = positions.iter().enumerate().find(|(_, p)| p.len() != 2) {
                return Err(GeometryDecodeError::Malformed(format!(
                    "position {} has {} values, expected [lon, lat]",
                    index,
                    p.len()
                )));
            }
            Ok(Geometry::Line(validate_path_points(positions)?))
        }
        other => Err(GeometryDecodeError::UnsupportedGeometry(value_kind(other).to_string())),
    }
}

/// Read the geometry of a Feature. A Feature without geometry is [`Geometry::Empty`].
pub fn feature_geometry(feature: &Feature) -> Result<Geometry, GeometryDecodeError> {
    match &feature.geometry {
        Some(geometry) => from_geojson(geometry),
        None => Ok(Geometry::Empty),
    }
}
