//! # Transit Service
//!
//! Operations on lines, routes, users and recording sessions over any [`Store`].
//!
//! Every write validates its whole input before touching storage, so a
//! rejected request never leaves a partial write behind.

use chrono::Utc;
use geojson::Feature;
use log::{debug, info};

use crate::aggregate::{OrderedProjection, TripPathAggregator};
use crate::codec::to_geojson;
use crate::config::Config;
use crate::error::{Error, NotFoundError, Result, ValidationError, ValidationErrors};
use crate::models::{
    Id, Line, LineCreate, LineUpdate, LineWithRoutes, LocationPoint, LocationPointBatch,
    RecordingSession, RecordingSessionCreate, RecordingStatus, Route, RouteCreate, RouteUpdate,
    SensorReading, SensorReadingBatch, User, UserCreate,
};
use crate::proximity::find_within;
use crate::store::{Entity, Page, Repository, Store};
use crate::validate::validate_point;

/// Wrap every error of item `index` of a batch so the caller can locate it.
fn at_index(index: usize, errors: ValidationErrors) -> impl Iterator<Item = ValidationError> {
    errors
        .errors()
        .to_vec()
        .into_iter()
        .map(move |e| ValidationError::AtIndex { index, source: Box::new(e) })
}

/// Validate every item of a batch, failing with all problems found.
fn validate_batch<T, U, F>(
    items: Vec<T>,
    convert: F,
) -> std::result::Result<Vec<U>, ValidationErrors>
where
    F: Fn(T) -> std::result::Result<U, ValidationErrors>,
{
    let mut valid = Vec::with_capacity(items.len());
    let mut errors = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        match convert(item) {
            Ok(v) => valid.push(v),
            Err(e) => errors.extend(at_index(index, e)),
        }
    }
    match ValidationErrors::from_vec(errors) {
        Some(errors) => Err(errors),
        None => Ok(valid),
    }
}

/// Library-level operations over a store.
#[derive(Debug)]
pub struct TransitService<S, A = OrderedProjection> {
    store: S,
    config: Config,
    aggregator: A,
}

impl<S: Store> TransitService<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self::with_aggregator(store, config, OrderedProjection)
    }
}

impl<S: Store, A: TripPathAggregator> TransitService<S, A> {
    /// Use `aggregator` to derive the path of completed sessions.
    pub fn with_aggregator(store: S, config: Config, aggregator: A) -> Self {
        Self { store, config, aggregator }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn fetch<E: Entity>(&self, id: Id) -> Result<E>
    where
        S: Repository<E>,
    {
        <S as Repository<E>>::get(&self.store, id)
            .ok_or_else(|| NotFoundError { entity: E::NAME, id }.into())
    }

    // ========================================================================
    // Lines
    // ========================================================================

    pub fn create_line(&mut self, create: LineCreate) -> Result<Line> {
        let line = <S as Repository<Line>>::insert(&mut self.store, create.into_line()?);
        info!("[Service] Created line {} ({})", line.id, line.name);
        Ok(line)
    }

    pub fn list_lines(&self, skip: Option<usize>, limit: Option<usize>) -> Vec<Line> {
        <S as Repository<Line>>::list(&self.store, &|_: &Line| true, self.config.page(skip, limit))
    }

    /// A line with all of its routes.
    pub fn get_line(&self, id: Id) -> Result<LineWithRoutes> {
        let line: Line = self.fetch(id)?;
        let routes = <S as Repository<Route>>::list(
            &self.store,
            &|route: &Route| route.line_id == id,
            Page::all(),
        );
        Ok(LineWithRoutes { line, routes })
    }

    pub fn update_line(&mut self, id: Id, update: LineUpdate) -> Result<Line> {
        update.validate()?;
        let mut line: Line = self.fetch(id)?;
        update.apply(&mut line);
        Ok(<S as Repository<Line>>::update(&mut self.store, line)?)
    }

    /// Delete a line and its routes. Recording sessions on the line are kept.
    pub fn delete_line(&mut self, id: Id) -> Result<()> {
        <S as Repository<Line>>::delete(&mut self.store, id)?;
        let routes = <S as Repository<Route>>::delete_where(&mut self.store, &|route: &Route| {
            route.line_id == id
        });
        info!("[Service] Deleted line {} with {} routes", id, routes);
        Ok(())
    }

    // ========================================================================
    // Routes
    // ========================================================================

    /// Create a route on an existing line.
    pub fn create_route(&mut self, create: RouteCreate) -> Result<Route> {
        let route = create.into_route()?;
        self.fetch::<Line>(route.line_id)?;
        let route = <S as Repository<Route>>::insert(&mut self.store, route);
        info!(
            "[Service] Created route {} on line {} ({} vertices, {:.0} m)",
            route.id,
            route.line_id,
            route.path.as_ref().map_or(0, |p| p.len()),
            route.path.as_ref().map_or(0.0, |p| p.length_meters())
        );
        Ok(route)
    }

    /// Routes, optionally only those of one line.
    pub fn list_routes(
        &self,
        line_id: Option<Id>,
        skip: Option<usize>,
        limit: Option<usize>,
    ) -> Vec<Route> {
        <S as Repository<Route>>::list(
            &self.store,
            &|route: &Route| line_id.map_or(true, |id| route.line_id == id),
            self.config.page(skip, limit),
        )
    }

    pub fn get_route(&self, id: Id) -> Result<Route> {
        self.fetch(id)
    }

    /// Partial update. The path follows [`crate::PathUpdate`] semantics.
    pub fn update_route(&mut self, id: Id, update: RouteUpdate) -> Result<Route> {
        let mut route: Route = self.fetch(id)?;
        update.apply(&mut route)?;
        Ok(<S as Repository<Route>>::update(&mut self.store, route)?)
    }

    pub fn delete_route(&mut self, id: Id) -> Result<()> {
        <S as Repository<Route>>::delete(&mut self.store, id)?;
        Ok(())
    }

    /// The route's path as a GeoJSON `LineString` Feature.
    ///
    /// A route whose path is still pending is reported as not found.
    pub fn route_geojson(&self, id: Id) -> Result<Feature> {
        let route: Route = self.fetch(id)?;
        let path = route
            .path
            .as_ref()
            .ok_or(NotFoundError { entity: "Route path", id })?;
        Ok(to_geojson(path, route.geojson_properties()))
    }

    /// Routes passing within `radius_meters` (default from [`Config`]) of a point.
    pub fn nearby_routes(
        &self,
        longitude: f64,
        latitude: f64,
        radius_meters: Option<f64>,
    ) -> Result<Vec<Route>> {
        let query = validate_point(longitude, latitude)?;
        let radius = radius_meters.unwrap_or(self.config.default_nearby_radius_meters);
        let candidates = self.store.spatial_range_query(&query, radius);
        let found: Vec<Route> = find_within(&query, radius, &candidates)?
            .into_iter()
            .cloned()
            .collect();
        debug!(
            "[Service] nearby ({}, {}) r={}m: {} of {} candidates",
            longitude,
            latitude,
            radius,
            found.len(),
            candidates.len()
        );
        Ok(found)
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Register a user. Username and email must be unique.
    pub fn create_user(&mut self, create: UserCreate) -> Result<User> {
        let user = create.into_user()?;
        let clash = <S as Repository<User>>::list(
            &self.store,
            &|existing: &User| {
                existing.username == user.username
                    || (user.email.is_some() && existing.email == user.email)
            },
            Page::new(0, 1),
        );
        if let Some(existing) = clash.first() {
            let field = if existing.username == user.username { "username" } else { "email" };
            return Err(Error::Conflict(format!("{} already registered", field)));
        }
        Ok(<S as Repository<User>>::insert(&mut self.store, user))
    }

    pub fn get_user(&self, id: Id) -> Result<User> {
        self.fetch(id)
    }

    // ========================================================================
    // Recording Sessions
    // ========================================================================

    /// Start recording a trip on an existing line.
    pub fn start_session(
        &mut self,
        user_id: Id,
        create: RecordingSessionCreate,
    ) -> Result<RecordingSession> {
        let session = create.into_session(user_id)?;
        self.fetch::<Line>(session.line_id)?;
        self.fetch::<User>(user_id)?;
        let session = <S as Repository<RecordingSession>>::insert(&mut self.store, session);
        info!(
            "[Service] Started session {} on line {} for user {}",
            session.id, session.line_id, user_id
        );
        Ok(session)
    }

    pub fn get_session(&self, id: Id) -> Result<RecordingSession> {
        self.fetch(id)
    }

    pub fn list_sessions(
        &self,
        line_id: Option<Id>,
        skip: Option<usize>,
        limit: Option<usize>,
    ) -> Vec<RecordingSession> {
        <S as Repository<RecordingSession>>::list(
            &self.store,
            &|session: &RecordingSession| line_id.map_or(true, |id| session.line_id == id),
            self.config.page(skip, limit),
        )
    }

    /// Delete a session together with its points and readings.
    pub fn delete_session(&mut self, id: Id) -> Result<()> {
        <S as Repository<RecordingSession>>::delete(&mut self.store, id)?;
        let points = <S as Repository<LocationPoint>>::delete_where(
            &mut self.store,
            &|p: &LocationPoint| p.session_id == id,
        );
        let readings = <S as Repository<SensorReading>>::delete_where(
            &mut self.store,
            &|r: &SensorReading| r.session_id == id,
        );
        info!(
            "[Service] Deleted session {} with {} points and {} readings",
            id, points, readings
        );
        Ok(())
    }

    fn open_session(&self, id: Id) -> Result<RecordingSession> {
        let session: RecordingSession = self.fetch(id)?;
        if !session.is_in_progress() {
            return Err(Error::SessionClosed { id, status: session.status });
        }
        Ok(session)
    }

    /// Append GPS fixes to an in-progress session. Nothing is stored unless
    /// every fix is valid.
    pub fn add_location_points(
        &mut self,
        session_id: Id,
        batch: LocationPointBatch,
    ) -> Result<usize> {
        self.open_session(session_id)?;
        let points = validate_batch(batch.points, |raw| raw.into_point(session_id))?;
        let count = points.len();
        for point in points {
            <S as Repository<LocationPoint>>::insert(&mut self.store, point);
        }
        debug!("[Service] Session {}: +{} location points", session_id, count);
        Ok(count)
    }

    /// Append sensor samples to an in-progress session. Nothing is stored
    /// unless every sample is valid.
    pub fn add_sensor_readings(
        &mut self,
        session_id: Id,
        batch: SensorReadingBatch,
    ) -> Result<usize> {
        self.open_session(session_id)?;
        let readings = validate_batch(batch.readings, |raw| raw.into_reading(session_id))?;
        let count = readings.len();
        for reading in readings {
            <S as Repository<SensorReading>>::insert(&mut self.store, reading);
        }
        debug!("[Service] Session {}: +{} sensor readings", session_id, count);
        Ok(count)
    }

    /// The session's GPS fixes in timestamp order.
    pub fn session_location_points(&self, session_id: Id) -> Result<Vec<LocationPoint>> {
        self.fetch::<RecordingSession>(session_id)?;
        let mut points = <S as Repository<LocationPoint>>::list(
            &self.store,
            &|p: &LocationPoint| p.session_id == session_id,
            Page::all(),
        );
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }

    pub fn session_sensor_readings(&self, session_id: Id) -> Result<Vec<SensorReading>> {
        self.fetch::<RecordingSession>(session_id)?;
        Ok(<S as Repository<SensorReading>>::list(
            &self.store,
            &|r: &SensorReading| r.session_id == session_id,
            Page::all(),
        ))
    }

    /// Finish a session and derive its path from the recorded fixes.
    ///
    /// A session with fewer than two fixes completes without a path.
    pub fn complete_session(&mut self, id: Id) -> Result<RecordingSession> {
        let mut session = self.open_session(id)?;
        let points = self.session_location_points(id)?;
        session.computed_path = self.aggregator.aggregate(&points);
        session.status = RecordingStatus::Completed;
        session.ended_at = Some(Utc::now());
        let session = <S as Repository<RecordingSession>>::update(&mut self.store, session)?;
        info!(
            "[Service] Completed session {}: {} fixes, path {}",
            id,
            points.len(),
            session.computed_path.as_ref().map_or(0, |p| p.len())
        );
        Ok(session)
    }

    /// Abandon a session. Its recorded data is kept until the session is deleted.
    pub fn cancel_session(&mut self, id: Id) -> Result<RecordingSession> {
        let mut session = self.open_session(id)?;
        session.status = RecordingStatus::Cancelled;
        session.ended_at = Some(Utc::now());
        let session = <S as Repository<RecordingSession>>::update(&mut self.store, session)?;
        info!("[Service] Cancelled session {}", id);
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> TransitService<MemoryStore> {
        TransitService::new(MemoryStore::new(), Config::default())
    }

    #[test]
    fn test_create_route_requires_line() {
        let mut svc = service();
        let err = svc
            .create_route(RouteCreate {
                line_id: 9,
                direction: "outbound".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(NotFoundError { entity: "Line", id: 9 })));
    }

    #[test]
    fn test_invalid_route_reported_before_lookup() {
        let mut svc = service();
        let err = svc
            .create_route(RouteCreate {
                line_id: 9,
                direction: "outbound".to_string(),
                path: Some(vec![vec![1.0, 2.0]]),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_route_geojson_without_path() {
        let mut svc = service();
        let line = svc
            .create_line(LineCreate { name: "L1".to_string(), description: None })
            .unwrap();
        let route = svc
            .create_route(RouteCreate {
                line_id: line.id,
                direction: "inbound".to_string(),
                ..Default::default()
            })
            .unwrap();
        let err = svc.route_geojson(route.id).unwrap_err();
        assert_eq!(err.to_string(), format!("Route path not found: {}", route.id));
    }

    #[test]
    fn test_validate_batch_reports_indices() {
        let errors = validate_batch(vec![1, -2, 3, -4], |n: i32| {
            if n < 0 {
                Err(ValidationError::Empty { field: "n" }.into())
            } else {
                Ok(n)
            }
        })
        .unwrap_err();
        let indices: Vec<usize> = errors
            .errors()
            .iter()
            .map(|e| match e {
                ValidationError::AtIndex { index, .. } => *index,
                _ => usize::MAX,
            })
            .collect();
        assert_eq!(indices, vec![1, 3]);
    }

    #[test]
    fn test_duplicate_username_conflicts() {
        let mut svc = service();
        svc.create_user(UserCreate { username: "rider".to_string(), email: None }).unwrap();
        let err = svc
            .create_user(UserCreate { username: "rider".to_string(), email: None })
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }
}
