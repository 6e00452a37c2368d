//! Journey points and their stores
//!
//! A [`PointStore`] keeps the points of each journey ordered by timestamp and
//! pushes the whole list to live queries on every change.
//!
//! Backends:
//! - [`MemoryPointStore`]: process-local, for tests and throwaway servers
//! - [`SqlitePointStore`]: durable, one SQLite file
//! - [`HttpPointStore`]: a remote Camino API server

pub mod error;
pub mod http;
pub mod memory;
pub mod sqlite;
pub mod store;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use http::{HttpPointStore, HttpStoreConfig};
pub use memory::MemoryPointStore;
pub use sqlite::SqlitePointStore;
pub use store::{LiveQuery, PointStore};
pub use types::{
    new_point_id, sort_points, Coordinates, JourneyId, NewPoint, Point, PointId, PointPatch,
    DEFAULT_COVER, DEFAULT_JOURNEY,
};
