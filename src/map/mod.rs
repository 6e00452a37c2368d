//! Map presentation
//!
//! - [`RoutePlan`]: pure geometry derived from an ordered point list
//! - [`MapView`]: draws a plan on a [`MapSurface`] and animates the current point
//! - [`Theme`]: light/dark palette and basemap tiles

pub mod route;
pub mod surface;
pub mod theme;
pub mod view;

pub use route::{haversine_km, marker_layer_id, Bounds, JourneySummary, MarkerSpec, RoutePlan};
pub use surface::{
    CameraMove, Feature, FitBounds, FlyTo, Geometry, LayerKind, LayerSpec, MapSurface, SceneGraph,
};
pub use theme::{Theme, CURRENT_COLOR};
pub use view::{pulse_frame, MapView, BASEMAP_SOURCE, PATH_LAYER, PATH_SOURCE};
