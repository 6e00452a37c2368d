//! # Camino
//!
//! A travel-journal backend and client core: an ordered list of geo-tagged
//! points along a journey, pushed live to every viewer, edited by a signed-in
//! admin, drawn as a route on a map and decorated with link previews.
//!
//! ## Modules
//!
//! - [`points`]: point records and the stores that keep them (memory, SQLite, HTTP)
//! - [`sync`]: client-side live list with loading and error state
//! - [`map`]: route planning, themes and the map view driver
//! - [`editor`]: add/edit form state machine
//! - [`timeline`]: timeline cards
//! - [`metadata`]: link preview fetching and extraction
//! - [`auth`]: admin sessions
//! - [`api`]: REST and WebSocket server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use camino::points::{Coordinates, JourneyId, MemoryPointStore};
//! use camino::sync::{PointDraft, PointSync};
//! use camino::clock::SystemClock;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sync = PointSync::new(Arc::new(MemoryPointStore::new()), Arc::new(SystemClock));
//!     let journey = JourneyId::default();
//!     let _subscription = sync.subscribe(&journey);
//!
//!     sync.add_point(
//!         &journey,
//!         PointDraft {
//!             title: "Santiago de Compostela".into(),
//!             coordinates: Some(Coordinates::new(42.8806, -8.5446)),
//!             timestamp: Some(chrono::Utc::now()),
//!             ..Default::default()
//!         },
//!     )
//!     .await?;
//!
//!     println!("{} points", sync.state().points.len());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod editor;
pub mod logging;
pub mod map;
pub mod metadata;
pub mod points;
pub mod sync;
pub mod timeline;
pub mod websocket;

// Re-export top-level types for convenience
pub use points::{
    Coordinates, HttpPointStore, JourneyId, MemoryPointStore, NewPoint, Point, PointId,
    PointPatch, PointStore, SqlitePointStore, StoreError, StoreResult,
};

pub use sync::{PointDraft, PointSync, Subscription, SyncError, SyncState, UpdateDraft};

pub use map::{JourneySummary, MapSurface, MapView, RoutePlan, SceneGraph, Theme};

pub use editor::{EditorError, EditorState, PointEditor};

pub use timeline::{timeline, TimelineEntry};

pub use metadata::{LinkMetadata, MetadataError, MetadataFetcher};

pub use auth::{AuthError, AuthService, SessionGate};

pub use api::{build_router, serve, ApiError, AppState};

pub use websocket::{ClientMessage, ConnectionHub, HubConfig, HubError, ServerMessage};

pub use config::{Config, ConfigError};
