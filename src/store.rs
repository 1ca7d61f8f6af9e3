//! Persistence boundary.
//!
//! The service layer talks to storage only through [`Repository`] and
//! [`Store`]. [`MemoryStore`] keeps everything in ordered maps and backs the
//! tests; a database-backed store implements the same traits and hands
//! geometries over in wire form (see [`crate::codec::decode_wire`]).

use std::collections::BTreeMap;

use log::debug;

use crate::error::NotFoundError;
use crate::models::{Id, Line, LocationPoint, RecordingSession, Route, SensorReading, User};
use crate::GeoPoint;

/// A stored row with a numeric identity.
pub trait Entity: Clone {
    /// Human-readable entity name used in "not found" errors.
    const NAME: &'static str;

    fn id(&self) -> Id;
    fn set_id(&mut self, id: Id);
}

macro_rules! impl_entity {
    ($($entity:ty => $name:expr),* $(,)?) => {
        $(
            impl Entity for $entity {
                const NAME: &'static str = $name;

                fn id(&self) -> Id {
                    self.id
                }

                fn set_id(&mut self, id: Id) {
                    self.id = id;
                }
            }
        )*
    };
}

impl_entity! {
    Line => "Line",
    Route => "Route",
    User => "User",
    RecordingSession => "Recording session",
    LocationPoint => "Location point",
    SensorReading => "Sensor reading",
}

/// Offset/limit window over a listing, in id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(skip: usize, limit: usize) -> Self {
        Self { skip, limit }
    }

    /// No window at all.
    pub fn all() -> Self {
        Self { skip: 0, limit: usize::MAX }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { skip: 0, limit: 100 }
    }
}

/// CRUD over one entity type.
pub trait Repository<E: Entity> {
    fn get(&self, id: Id) -> Option<E>;

    /// Rows matching `filter`, ordered by id, windowed by `page`.
    fn list(&self, filter: &dyn Fn(&E) -> bool, page: Page) -> Vec<E>;

    /// Store a new row under a freshly assigned id and return it.
    fn insert(&mut self, entity: E) -> E;

    /// Replace an existing row.
    fn update(&mut self, entity: E) -> Result<E, NotFoundError>;

    fn delete(&mut self, id: Id) -> Result<E, NotFoundError>;

    /// Insert when `entity` has never been stored (id `0`), update otherwise.
    fn upsert(&mut self, entity: E) -> Result<E, NotFoundError> {
        if entity.id() == 0 {
            Ok(self.insert(entity))
        } else {
            self.update(entity)
        }
    }

    /// Delete every row matching `filter`, returning how many went.
    fn delete_where(&mut self, filter: &dyn Fn(&E) -> bool) -> usize;
}

/// Everything the service layer needs from storage.
pub trait Store:
    Repository<Line>
    + Repository<Route>
    + Repository<User>
    + Repository<RecordingSession>
    + Repository<LocationPoint>
    + Repository<SensorReading>
{
    /// Coarse pre-filter for proximity search: routes whose bounding box,
    /// grown by `radius_meters` of Web Mercator distance, contains `point`.
    ///
    /// May return routes farther away than the radius, never drops one within
    /// it. Routes without a path are left out.
    fn spatial_range_query(&self, point: &GeoPoint, radius_meters: f64) -> Vec<Route> {
        <Self as Repository<Route>>::list(
            self,
            &|route: &Route| {
                route
                    .path
                    .as_ref()
                    .is_some_and(|path| path.bounds().contains_with_buffer(point, radius_meters))
            },
            Page::all(),
        )
    }
}

/// In-memory rows of one entity type.
#[derive(Debug, Clone)]
pub struct Table<E> {
    rows: BTreeMap<Id, E>,
    next_id: Id,
}

impl<E> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<E> Table<E> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<E: Entity> Repository<E> for Table<E> {
    fn get(&self, id: Id) -> Option<E> {
        self.rows.get(&id).cloned()
    }

    fn list(&self, filter: &dyn Fn(&E) -> bool, page: Page) -> Vec<E> {
        self.rows
            .values()
            .filter(|row| filter(row))
            .skip(page.skip)
            .take(page.limit)
            .cloned()
            .collect()
    }

    fn insert(&mut self, mut entity: E) -> E {
        let id = self.next_id;
        self.next_id += 1;
        entity.set_id(id);
        self.rows.insert(id, entity.clone());
        debug!("[Store] Inserted {} {}", E::NAME, id);
        entity
    }

    fn update(&mut self, entity: E) -> Result<E, NotFoundError> {
        let id = entity.id();
        match self.rows.get_mut(&id) {
            Some(row) => {
                *row = entity.clone();
                Ok(entity)
            }
            None => Err(NotFoundError { entity: E::NAME, id }),
        }
    }

    fn delete(&mut self, id: Id) -> Result<E, NotFoundError> {
        let removed = self
            .rows
            .remove(&id)
            .ok_or(NotFoundError { entity: E::NAME, id })?;
        debug!("[Store] Deleted {} {}", E::NAME, id);
        Ok(removed)
    }

    fn delete_where(&mut self, filter: &dyn Fn(&E) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(|_, row| !filter(row));
        let removed = before - self.rows.len();
        if removed > 0 {
            debug!("[Store] Deleted {} {} rows", removed, E::NAME);
        }
        removed
    }
}

/// All tables in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    lines: Table<Line>,
    routes: Table<Route>,
    users: Table<User>,
    sessions: Table<RecordingSession>,
    points: Table<LocationPoint>,
    readings: Table<SensorReading>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

macro_rules! delegate_repository {
    ($($entity:ty => $table:ident),* $(,)?) => {
        $(
            impl Repository<$entity> for MemoryStore {
                fn get(&self, id: Id) -> Option<$entity> {
                    self.$table.get(id)
                }

                fn list(&self, filter: &dyn Fn(&$entity) -> bool, page: Page) -> Vec<$entity> {
                    self.$table.list(filter, page)
                }

                fn insert(&mut self, entity: $entity) -> $entity {
                    self.$table.insert(entity)
                }

                fn update(&mut self, entity: $entity) -> Result<$entity, NotFoundError> {
                    self.$table.update(entity)
                }

                fn delete(&mut self, id: Id) -> Result<$entity, NotFoundError> {
                    self.$table.delete(id)
                }

                fn delete_where(&mut self, filter: &dyn Fn(&$entity) -> bool) -> usize {
                    self.$table.delete_where(filter)
                }
            }
        )*
    };
}

delegate_repository! {
    Line => lines,
    Route => routes,
    User => users,
    RecordingSession => sessions,
    LocationPoint => points,
    SensorReading => readings,
}

impl Store for MemoryStore {}
