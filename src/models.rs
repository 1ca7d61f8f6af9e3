//! Transit lines, routes, users and recorded trips.
//!
//! Entities carry validated geometry ([`GeoPoint`], [`Path`]). The `*Create`
//! and `*Update` shapes carry raw caller input and turn into entities only
//! through their `validate` methods.

use std::fmt;

use chrono::{DateTime, Utc};
use geojson::JsonObject;
use serde::{Deserialize, Serialize};

use crate::codec::{encode_point_wkt, encode_wkt};
use crate::error::{ValidationError, ValidationErrors};
use crate::path_builder::{build_optional_path, PathUpdate};
use crate::validate::{
    validate_bearing, validate_color, validate_heading, validate_measurement, validate_point,
    validate_required_text, validate_text,
};
use crate::{GeoPoint, Geometry, Path};

/// Storage identifier. `0` marks an entity that has not been stored yet.
pub type Id = i64;

pub const LINE_NAME_MAX: usize = 255;
pub const LINE_DESCRIPTION_MAX: usize = 1000;
pub const ROUTE_DIRECTION_MAX: usize = 100;
pub const ROUTE_DISTINCTIVE_MAX: usize = 255;
pub const USERNAME_MAX: usize = 100;
pub const EMAIL_MAX: usize = 255;
pub const SESSION_DIRECTION_MAX: usize = 100;
pub const DEVICE_MODEL_MAX: usize = 100;
pub const OS_VERSION_MAX: usize = 50;

fn keep<T>(errors: &mut Vec<ValidationError>, result: Result<T, ValidationError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

fn check_optional_text(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: Option<&str>,
    max: usize,
) {
    if let Some(value) = value {
        keep(errors, validate_text(field, value, max));
    }
}

fn finish(errors: Vec<ValidationError>) -> Result<(), ValidationErrors> {
    match ValidationErrors::from_vec(errors) {
        Some(errors) => Err(errors),
        None => Ok(()),
    }
}

// ============================================================================
// Lines
// ============================================================================

/// A transit line, e.g. "Line 42" or "Red Line".
///
/// Deleting a line deletes its routes; recording sessions on it are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Line {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl LineCreate {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        keep(&mut errors, validate_required_text("name", &self.name, LINE_NAME_MAX));
        check_optional_text(
            &mut errors,
            "description",
            self.description.as_deref(),
            LINE_DESCRIPTION_MAX,
        );
        finish(errors)
    }

    pub fn into_line(self) -> Result<Line, ValidationErrors> {
        self.validate()?;
        let mut line = Line::new(self.name);
        line.description = self.description;
        Ok(line)
    }
}

/// Partial line update; omitted fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl LineUpdate {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        if let Some(name) = &self.name {
            keep(&mut errors, validate_required_text("name", name, LINE_NAME_MAX));
        }
        check_optional_text(
            &mut errors,
            "description",
            self.description.as_deref(),
            LINE_DESCRIPTION_MAX,
        );
        finish(errors)
    }

    pub fn apply(self, line: &mut Line) {
        if let Some(name) = self.name {
            line.name = name;
        }
        if let Some(description) = self.description {
            line.description = Some(description);
        }
        line.updated_at = Utc::now();
    }
}

/// A line together with its routes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineWithRoutes {
    #[serde(flatten)]
    pub line: Line,
    pub routes: Vec<Route>,
}

// ============================================================================
// Routes
// ============================================================================

/// One direction of travel within a line.
///
/// `path` is `None` while the route's geometry is still pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: Id,
    pub line_id: Id,
    /// e.g. "outbound", "inbound", "clockwise"
    pub direction: String,
    /// e.g. "express", "via downtown"
    pub distinctive: Option<String>,
    /// `#RRGGBB`
    pub color: Option<String>,
    pub path: Option<Path>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Route {
    pub fn new(line_id: Id, direction: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            line_id,
            direction: direction.into(),
            distinctive: None,
            color: None,
            path: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::from(self.path.clone())
    }

    /// The path in storage form, `None` while pending.
    pub fn path_wkt(&self) -> Option<String> {
        self.path.as_ref().map(encode_wkt)
    }

    /// Properties attached to the route's GeoJSON Feature.
    pub fn geojson_properties(&self) -> JsonObject {
        let mut props = JsonObject::new();
        props.insert("id".to_string(), self.id.into());
        props.insert("line_id".to_string(), self.line_id.into());
        props.insert("direction".to_string(), self.direction.clone().into());
        props.insert(
            "distinctive".to_string(),
            self.distinctive.clone().map_or(serde_json::Value::Null, Into::into),
        );
        props
    }
}

fn check_route_fields(
    errors: &mut Vec<ValidationError>,
    direction: Option<&str>,
    distinctive: Option<&str>,
    color: Option<&str>,
) {
    if let Some(direction) = direction {
        keep(errors, validate_required_text("direction", direction, ROUTE_DIRECTION_MAX));
    }
    check_optional_text(errors, "distinctive", distinctive, ROUTE_DISTINCTIVE_MAX);
    if let Some(color) = color {
        keep(errors, validate_color(color));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteCreate {
    pub line_id: Id,
    pub direction: String,
    #[serde(default)]
    pub distinctive: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    /// `[[longitude, latitude], ...]`
    #[serde(default)]
    pub path: Option<Vec<Vec<f64>>>,
}

impl RouteCreate {
    /// Check every field, returning the validated path.
    pub fn validate(&self) -> Result<Option<Path>, ValidationErrors> {
        let mut errors = Vec::new();
        check_route_fields(
            &mut errors,
            Some(&self.direction),
            self.distinctive.as_deref(),
            self.color.as_deref(),
        );
        let path = match build_optional_path(self.path.as_deref()) {
            Ok(path) => path,
            Err(path_errors) => {
                errors.extend(path_errors.errors().iter().cloned());
                None
            }
        };
        finish(errors)?;
        Ok(path)
    }

    /// The path in storage form.
    pub fn to_linestring(&self) -> Result<Option<String>, ValidationErrors> {
        Ok(self.validate()?.as_ref().map(encode_wkt))
    }

    pub fn into_route(self) -> Result<Route, ValidationErrors> {
        let path = self.validate()?;
        let mut route = Route::new(self.line_id, self.direction);
        route.distinctive = self.distinctive;
        route.color = self.color;
        route.path = path;
        Ok(route)
    }
}

/// Partial route update.
///
/// An omitted, null or empty `path` leaves the stored path alone. Setting
/// `clear_path` removes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteUpdate {
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub distinctive: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub path: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub clear_path: bool,
}

impl RouteUpdate {
    pub fn validate(&self) -> Result<PathUpdate, ValidationErrors> {
        let mut errors = Vec::new();
        check_route_fields(
            &mut errors,
            self.direction.as_deref(),
            self.distinctive.as_deref(),
            self.color.as_deref(),
        );
        let update = match PathUpdate::from_raw(self.path.as_deref(), self.clear_path) {
            Ok(update) => update,
            Err(path_errors) => {
                errors.extend(path_errors.errors().iter().cloned());
                PathUpdate::Unchanged
            }
        };
        finish(errors)?;
        Ok(update)
    }

    /// Validate and apply to `route`. On error `route` is untouched.
    pub fn apply(self, route: &mut Route) -> Result<(), ValidationErrors> {
        let path_update = self.validate()?;
        if let Some(direction) = self.direction {
            route.direction = direction;
        }
        if let Some(distinctive) = self.distinctive {
            route.distinctive = Some(distinctive);
        }
        if let Some(color) = self.color {
            route.color = Some(color);
        }
        route.path = path_update.apply(route.path.take());
        route.updated_at = Utc::now();
        Ok(())
    }
}

// ============================================================================
// Users
// ============================================================================

/// Someone who records trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserCreate {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserCreate {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        keep(&mut errors, validate_required_text("username", &self.username, USERNAME_MAX));
        if let Some(email) = &self.email {
            keep(&mut errors, validate_text("email", email, EMAIL_MAX));
            if !email.contains('@') {
                errors.push(ValidationError::Invalid {
                    field: "email",
                    reason: format!("{:?} is not an email address", email),
                });
            }
        }
        finish(errors)
    }

    pub fn into_user(self) -> Result<User, ValidationErrors> {
        self.validate()?;
        Ok(User {
            id: 0,
            username: self.username,
            email: self.email,
            password_hash: None,
            is_active: true,
            created_at: Utc::now(),
        })
    }
}

// ============================================================================
// Recording Sessions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    InProgress,
    Completed,
    Cancelled,
}

impl fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordingStatus::InProgress => "in_progress",
            RecordingStatus::Completed => "completed",
            RecordingStatus::Cancelled => "cancelled",
        })
    }
}

/// A single recorded trip on a line.
///
/// `computed_path` is filled in when the session completes. Location points and
/// sensor readings belong to the session and are deleted with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSession {
    pub id: Id,
    pub line_id: Id,
    pub user_id: Id,
    pub direction: Option<String>,
    pub device_model: Option<String>,
    pub os_version: Option<String>,
    pub notes: Option<String>,
    pub status: RecordingStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub computed_path: Option<Path>,
}

impl RecordingSession {
    pub fn is_in_progress(&self) -> bool {
        self.status == RecordingStatus::InProgress
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingSessionCreate {
    pub line_id: Id,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub device_model: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RecordingSessionCreate {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        check_optional_text(
            &mut errors,
            "direction",
            self.direction.as_deref(),
            SESSION_DIRECTION_MAX,
        );
        check_optional_text(
            &mut errors,
            "device_model",
            self.device_model.as_deref(),
            DEVICE_MODEL_MAX,
        );
        check_optional_text(&mut errors, "os_version", self.os_version.as_deref(), OS_VERSION_MAX);
        finish(errors)
    }

    pub fn into_session(self, user_id: Id) -> Result<RecordingSession, ValidationErrors> {
        self.validate()?;
        Ok(RecordingSession {
            id: 0,
            line_id: self.line_id,
            user_id,
            direction: self.direction,
            device_model: self.device_model,
            os_version: self.os_version,
            notes: self.notes,
            status: RecordingStatus::InProgress,
            started_at: Utc::now(),
            ended_at: None,
            computed_path: None,
        })
    }
}

// ============================================================================
// Location Points
// ============================================================================

/// One GPS fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPoint {
    pub id: Id,
    pub session_id: Id,
    pub timestamp: DateTime<Utc>,
    /// `[longitude, latitude]`
    pub point: GeoPoint,
    /// Meters above sea level
    pub altitude: Option<f64>,
    /// Meters per second
    pub speed: Option<f64>,
    /// Degrees from north, `[0, 360)`
    pub bearing: Option<f64>,
    /// Meters
    pub horizontal_accuracy: Option<f64>,
    /// Meters
    pub vertical_accuracy: Option<f64>,
}

impl LocationPoint {
    /// The fix in storage form, `SRID=4326;POINT(lon lat)`.
    pub fn point_wkt(&self) -> String {
        encode_point_wkt(&self.point)
    }
}

/// A GPS fix as uploaded by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPointCreate {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub bearing: Option<f64>,
    #[serde(default)]
    pub horizontal_accuracy: Option<f64>,
    #[serde(default)]
    pub vertical_accuracy: Option<f64>,
}

impl LocationPointCreate {
    pub fn new(timestamp: DateTime<Utc>, longitude: f64, latitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            altitude: None,
            speed: None,
            bearing: None,
            horizontal_accuracy: None,
            vertical_accuracy: None,
        }
    }

    /// Check every field, returning the validated position.
    pub fn validate(&self) -> Result<GeoPoint, ValidationErrors> {
        let mut errors = Vec::new();
        let point = keep(&mut errors, validate_point(self.longitude, self.latitude));
        keep(&mut errors, self.bearing.map(validate_bearing).transpose());
        keep(&mut errors, validate_measurement("altitude", self.altitude));
        keep(&mut errors, validate_measurement("speed", self.speed));
        keep(&mut errors, validate_measurement("horizontal_accuracy", self.horizontal_accuracy));
        keep(&mut errors, validate_measurement("vertical_accuracy", self.vertical_accuracy));
        finish(errors)?;
        point.ok_or_else(|| ValidationErrors::from(ValidationError::Empty { field: "point" }))
    }

    pub fn into_point(self, session_id: Id) -> Result<LocationPoint, ValidationErrors> {
        let point = self.validate()?;
        Ok(LocationPoint {
            id: 0,
            session_id,
            timestamp: self.timestamp,
            point,
            altitude: self.altitude,
            speed: self.speed,
            bearing: self.bearing,
            horizontal_accuracy: self.horizontal_accuracy,
            vertical_accuracy: self.vertical_accuracy,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationPointBatch {
    pub points: Vec<LocationPointCreate>,
}

// ============================================================================
// Sensor Readings
// ============================================================================

/// One inertial/environmental sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: Id,
    pub session_id: Id,
    pub timestamp: DateTime<Utc>,
    /// Accelerometer, m/s²
    pub accel_x: Option<f64>,
    pub accel_y: Option<f64>,
    pub accel_z: Option<f64>,
    /// Gyroscope, rad/s
    pub gyro_x: Option<f64>,
    pub gyro_y: Option<f64>,
    pub gyro_z: Option<f64>,
    /// Barometric pressure, hPa
    pub pressure: Option<f64>,
    /// Degrees, `[0, 360)`
    pub magnetic_heading: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReadingCreate {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub accel_x: Option<f64>,
    #[serde(default)]
    pub accel_y: Option<f64>,
    #[serde(default)]
    pub accel_z: Option<f64>,
    #[serde(default)]
    pub gyro_x: Option<f64>,
    #[serde(default)]
    pub gyro_y: Option<f64>,
    #[serde(default)]
    pub gyro_z: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub magnetic_heading: Option<f64>,
}

impl SensorReadingCreate {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            accel_x: None,
            accel_y: None,
            accel_z: None,
            gyro_x: None,
            gyro_y: None,
            gyro_z: None,
            pressure: None,
            magnetic_heading: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        for (field, value) in [
            ("accel_x", self.accel_x),
            ("accel_y", self.accel_y),
            ("accel_z", self.accel_z),
            ("gyro_x", self.gyro_x),
            ("gyro_y", self.gyro_y),
            ("gyro_z", self.gyro_z),
            ("pressure", self.pressure),
        ] {
            keep(&mut errors, validate_measurement(field, value));
        }
        keep(&mut errors, self.magnetic_heading.map(validate_heading).transpose());
        finish(errors)
    }

    pub fn into_reading(self, session_id: Id) -> Result<SensorReading, ValidationErrors> {
        self.validate()?;
        Ok(SensorReading {
            id: 0,
            session_id,
            timestamp: self.timestamp,
            accel_x: self.accel_x,
            accel_y: self.accel_y,
            accel_z: self.accel_z,
            gyro_x: self.gyro_x,
            gyro_y: self.gyro_y,
            gyro_z: self.gyro_z,
            pressure: self.pressure,
            magnetic_heading: self.magnetic_heading,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReadingBatch {
    pub readings: Vec<SensorReadingCreate>,
}
