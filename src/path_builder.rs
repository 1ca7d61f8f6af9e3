//! Turns raw caller coordinates into a stored route path.
//!
//! Creation and update share the same validation, so the two can never drift
//! apart. Either the whole path is valid and encoded, or nothing is produced
//! and every invalid point is reported.

use crate::codec::encode_wkt;
use crate::error::{ValidationError, ValidationErrors};
use crate::validate::validate_path_points;
use crate::Path;

/// Validate raw `[lon, lat]` pairs and encode them for storage.
///
/// ```rust
/// use open_transit::path_builder::build_path;
///
/// assert_eq!(
///     build_path(&[[1.0, 2.0], [3.0, 4.0]]).unwrap(),
///     "SRID=4326;LINESTRING(1 2, 3 4)"
/// );
/// assert!(build_path(&[[1.0, 2.0]]).is_err());
/// ```
pub fn build_path<P: AsRef<[f64]>>(raw: &[P]) -> Result<String, ValidationErrors> {
    validate_path_points(raw).map(|path| encode_wkt(&path))
}

/// Path handling on create: no coordinates means a route whose path is pending.
pub fn build_optional_path<P: AsRef<[f64]>>(
    raw: Option<&[P]>,
) -> Result<Option<Path>, ValidationErrors> {
    raw.map(|points| validate_path_points(points)).transpose()
}

/// What an update does to a stored path.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PathUpdate {
    /// Leave the stored path as it is.
    #[default]
    Unchanged,
    /// Remove the stored path; the route goes back to "path pending".
    Clear,
    /// Replace the stored path wholesale.
    Set(Path),
}

impl PathUpdate {
    /// Resolve raw update input.
    ///
    /// An omitted path and an empty coordinate list both mean "no change".
    /// Anything else must be a valid path. Clearing is never inferred from raw
    /// coordinates and has to be requested with `clear`.
    pub fn from_raw<P: AsRef<[f64]>>(
        raw: Option<&[P]>,
        clear: bool,
    ) -> Result<Self, ValidationErrors> {
        match (raw, clear) {
            (Some(points), true) if !points.is_empty() => Err(ValidationError::Invalid {
                field: "path",
                reason: "cannot set and clear the path in the same update".to_string(),
            }
            .into()),
            (_, true) => Ok(PathUpdate::Clear),
            (None, false) => Ok(PathUpdate::Unchanged),
            (Some(points), false) if points.is_empty() => Ok(PathUpdate::Unchanged),
            (Some(points), false) => validate_path_points(points).map(PathUpdate::Set),
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, PathUpdate::Unchanged)
    }

    /// The path after applying this update to `current`.
    pub fn apply(self, current: Option<Path>) -> Option<Path> {
        match self {
            PathUpdate::Unchanged => current,
            PathUpdate::Clear => None,
            PathUpdate::Set(path) => Some(path),
        }
    }

    /// Column value for a storage `UPDATE`: `None` means the column is not
    /// touched, `Some(None)` writes null.
    pub fn wire(&self) -> Option<Option<String>> {
        match self {
            PathUpdate::Unchanged => None,
            PathUpdate::Clear => Some(None),
            PathUpdate::Set(path) => Some(Some(encode_wkt(path))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing() -> Path {
        validate_path_points(&[[0.0, 0.0], [1.0, 1.0]]).unwrap()
    }

    #[test]
    fn test_build_path_rejects_single_point() {
        let errors = build_path(&[[1.0, 2.0]]).unwrap_err();
        assert!(matches!(errors.first(), ValidationError::InsufficientVertices { .. }));
    }

    #[test]
    fn test_build_path_lists_every_bad_point() {
        let errors = build_path(&[[0.0, 0.0], [190.0, 0.0], [0.0, 100.0]]).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.to_string().contains("190"));
        assert!(errors.to_string().contains("100"));
    }

    #[test]
    fn test_build_optional_path() {
        let none: Option<&[[f64; 2]]> = None;
        assert_eq!(build_optional_path(none).unwrap(), None);
        let raw = [[0.0, 0.0], [1.0, 1.0]];
        assert_eq!(build_optional_path(Some(&raw[..])).unwrap(), Some(existing()));
    }

    #[test]
    fn test_update_omitted_or_empty_is_unchanged() {
        let none: Option<&[Vec<f64>]> = None;
        assert_eq!(PathUpdate::from_raw(none, false).unwrap(), PathUpdate::Unchanged);

        let empty: Vec<Vec<f64>> = vec![];
        let update = PathUpdate::from_raw(Some(&empty[..]), false).unwrap();
        assert!(update.is_unchanged());
        assert_eq!(update.apply(Some(existing())), Some(existing()));
    }

    #[test]
    fn test_update_set_replaces_wholesale() {
        let raw = [[5.0, 5.0], [6.0, 6.0], [7.0, 7.0]];
        let update = PathUpdate::from_raw(Some(&raw[..]), false).unwrap();
        assert_eq!(update.wire(), Some(Some("SRID=4326;LINESTRING(5 5, 6 6, 7 7)".to_string())));
        assert_eq!(update.apply(Some(existing())).map(|p| p.len()), Some(3));
    }

    #[test]
    fn test_update_invalid_set_fails() {
        let raw = [[5.0, 5.0]];
        assert!(PathUpdate::from_raw(Some(&raw[..]), false).is_err());
    }

    #[test]
    fn test_update_clear() {
        let none: Option<&[[f64; 2]]> = None;
        let update = PathUpdate::from_raw(none, true).unwrap();
        assert_eq!(update.wire(), Some(None));
        assert_eq!(update.apply(Some(existing())), None);

        let raw = [[5.0, 5.0], [6.0, 6.0]];
        assert!(PathUpdate::from_raw(Some(&raw[..]), true).is_err());
    }
}
