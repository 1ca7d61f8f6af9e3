//! Error types.
//!
//! Every failure is returned to the caller as-is. Nothing here is retried or
//! replaced with a fallback value: these are caller-input or data-integrity
//! problems, not transient faults.

use std::fmt;

use thiserror::Error;

use crate::models::{Id, RecordingStatus};

pub type Result<T> = std::result::Result<T, Error>;

/// Which side of an allowed range a value fell outside of.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    /// Inclusive lower bound.
    Min(f64),
    /// Inclusive upper bound.
    Max(f64),
    /// Exclusive upper bound.
    Below(f64),
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Min(v) => write!(f, "must be >= {}", v),
            Bound::Max(v) => write!(f, "must be <= {}", v),
            Bound::Below(v) => write!(f, "must be < {}", v),
        }
    }
}

/// Malformed or out-of-range input. Always names the field and the value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} {bound}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        bound: Bound,
    },

    #[error("{field} must be a finite number, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("point {index} must be [longitude, latitude], got {len} components")]
    WrongArity { index: usize, len: usize },

    #[error("insufficient vertices: a path needs at least {min} points, got {count}")]
    InsufficientVertices { count: usize, min: usize },

    #[error("point {index}: {source}")]
    AtIndex {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be at most {max} characters, got {len}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ValidationError {
    /// The name of the offending field, e.g. `"longitude"`.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::OutOfRange { field, .. }
            | ValidationError::NotFinite { field, .. }
            | ValidationError::Empty { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::Invalid { field, .. } => field,
            ValidationError::WrongArity { .. } | ValidationError::InsufficientVertices { .. } => {
                "path"
            }
            ValidationError::AtIndex { source, .. } => source.field(),
        }
    }
}

/// Every problem found in one piece of input, in the order encountered.
///
/// Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// `None` when there is nothing to report.
    pub fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    pub fn first(&self) -> &ValidationError {
        &self.0[0]
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self(vec![error])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.first())
    }
}

/// Stored geometry that could not be turned into a [`crate::Geometry`].
#[derive(Debug, Error)]
pub enum GeometryDecodeError {
    #[error("unsupported geometry type: {0}")]
    UnsupportedGeometry(String),

    #[error("unsupported SRID {0}, expected 4326")]
    UnsupportedSrid(i32),

    #[error("malformed geometry: {0}")]
    Malformed(String),

    #[error("geometry buffer truncated")]
    Truncated(#[from] std::io::Error),

    #[error("geometry holds an invalid coordinate: {0}")]
    InvalidCoordinate(#[from] ValidationError),

    #[error("geometry holds an invalid path: {0}")]
    InvalidPath(#[from] ValidationErrors),
}

/// A referenced entity does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: Id,
}

/// Umbrella error for service operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("validation failed: {0}")]
    InvalidInput(#[from] ValidationErrors),

    #[error(transparent)]
    Decode(#[from] GeometryDecodeError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("recording session {id} is {status}, expected in_progress")]
    SessionClosed { id: Id, status: RecordingStatus },
}
