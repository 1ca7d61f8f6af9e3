//! # Coordinate Validation
//!
//! Range checks applied to raw input before any geometry is built.
//!
//! | Value | Legal range |
//! |-------|-------------|
//! | longitude | `[-180, 180]` |
//! | latitude | `[-90, 90]` |
//! | bearing | `[0, 360)` |
//! | magnetic heading | `[0, 360)` |
//!
//! Raw coordinate pairs are always read as `[longitude, latitude]`. Swapping the
//! two is the most common input mistake, and since both slots accept values up
//! to 90 it is only caught when the latitude slot falls outside `[-90, 90]`.
//!
//! All functions are pure.

use crate::error::{Bound, ValidationError, ValidationErrors};
use crate::{GeoPoint, Path};

pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;
pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;

/// Exclusive upper bound for bearings and headings.
pub const FULL_CIRCLE_DEGREES: f64 = 360.0;

// =============================================================================
// Numeric Ranges
// =============================================================================

fn check_finite(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NotFinite { field, value })
    }
}

/// Check `min <= value <= max`.
pub fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<f64, ValidationError> {
    let value = check_finite(field, value)?;
    if value < min {
        return Err(ValidationError::OutOfRange { field, value, bound: Bound::Min(min) });
    }
    if value > max {
        return Err(ValidationError::OutOfRange { field, value, bound: Bound::Max(max) });
    }
    Ok(value)
}

/// Check `min <= value < max`.
pub fn check_half_open_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<f64, ValidationError> {
    let value = check_finite(field, value)?;
    if value < min {
        return Err(ValidationError::OutOfRange { field, value, bound: Bound::Min(min) });
    }
    if value >= max {
        return Err(ValidationError::OutOfRange { field, value, bound: Bound::Below(max) });
    }
    Ok(value)
}

pub fn validate_longitude(longitude: f64) -> Result<f64, ValidationError> {
    check_range("longitude", longitude, MIN_LONGITUDE, MAX_LONGITUDE)
}

pub fn validate_latitude(latitude: f64) -> Result<f64, ValidationError> {
    check_range("latitude", latitude, MIN_LATITUDE, MAX_LATITUDE)
}

/// Bearing in degrees from north, `[0, 360)`.
pub fn validate_bearing(bearing: f64) -> Result<f64, ValidationError> {
    check_half_open_range("bearing", bearing, 0.0, FULL_CIRCLE_DEGREES)
}

/// Magnetic heading in degrees, `[0, 360)`.
pub fn validate_heading(heading: f64) -> Result<f64, ValidationError> {
    check_half_open_range("magnetic_heading", heading, 0.0, FULL_CIRCLE_DEGREES)
}

/// Optional measurement that only has to be a real number when present.
pub fn validate_measurement(
    field: &'static str,
    value: Option<f64>,
) -> Result<Option<f64>, ValidationError> {
    value.map(|v| check_finite(field, v)).transpose()
}

// =============================================================================
// Points and Paths
// =============================================================================

/// Validate a `(longitude, latitude)` pair and build a [`GeoPoint`].
///
/// Longitude is checked first, so a pair with both values out of range
/// reports the longitude.
///
/// # Example
///
/// ```rust
/// use open_transit::validate::validate_point;
///
/// assert!(validate_point(95.0, 10.0).is_ok());
///
/// let err = validate_point(10.0, 95.0).unwrap_err();
/// assert_eq!(err.field(), "latitude");
/// ```
pub fn validate_point(longitude: f64, latitude: f64) -> Result<GeoPoint, ValidationError> {
    let longitude = validate_longitude(longitude)?;
    let latitude = validate_latitude(latitude)?;
    Ok(GeoPoint::from_validated(longitude, latitude))
}

/// Validate one raw `[longitude, latitude]` pair at position `index` of a sequence.
pub fn validate_pair(index: usize, raw: &[f64]) -> Result<GeoPoint, ValidationError> {
    match *raw {
        [longitude, latitude] => validate_point(longitude, latitude).map_err(|e| {
            ValidationError::AtIndex { index, source: Box::new(e) }
        }),
        _ => Err(ValidationError::WrongArity { index, len: raw.len() }),
    }
}

/// Validate a sequence of raw pairs and build a [`Path`].
///
/// Every point is checked, and every problem is reported, so a caller can fix
/// the whole input in one round trip. Nothing is built unless all points pass.
///
/// # Example
///
/// ```rust
/// use open_transit::validate::validate_path_points;
///
/// let path = validate_path_points(&[[0.0, 0.0], [0.0, 1.0]]).unwrap();
/// assert_eq!(path.len(), 2);
///
/// let errors = validate_path_points(&[[0.0, 0.0], [200.0, 0.0], [0.0, -95.0]]).unwrap_err();
/// assert_eq!(errors.len(), 2);
/// ```
pub fn validate_path_points<P: AsRef<[f64]>>(raw: &[P]) -> Result<Path, ValidationErrors> {
    let mut errors = Vec::new();
    if raw.len() < Path::MIN_POINTS {
        errors.push(ValidationError::InsufficientVertices {
            count: raw.len(),
            min: Path::MIN_POINTS,
        });
    }

    let mut points = Vec::with_capacity(raw.len());
    for (index, pair) in raw.iter().enumerate() {
        match validate_pair(index, pair.as_ref()) {
            Ok(point) => points.push(point),
            Err(e) => errors.push(e),
        }
    }

    if let Some(errors) = ValidationErrors::from_vec(errors) {
        log::debug!("[Validate] Rejected path of {} points: {}", raw.len(), errors);
        return Err(errors);
    }

    Path::new(points).map_err(ValidationErrors::from)
}

// =============================================================================
// Text Fields
// =============================================================================

/// Length limit counted in characters.
pub fn validate_text(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::TooLong { field, len, max });
    }
    Ok(())
}

/// Non-empty text within a length limit.
pub fn validate_required_text(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    validate_text(field, value, max)
}

/// Display color in `#RRGGBB` form.
pub fn validate_color(color: &str) -> Result<(), ValidationError> {
    validate_text("color", color, 7)?;
    let hex = color.strip_prefix('#').unwrap_or("");
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::Invalid {
            field: "color",
            reason: format!("expected #RRGGBB, got {:?}", color),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
