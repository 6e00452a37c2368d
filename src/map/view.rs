//! Journey map view
//!
//! Draws a journey on a [`MapSurface`]: a dashed route line, one circle per
//! point and a pulsing halo around the current point. Every render replaces
//! the previous drawing.

use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::route::{MarkerSpec, RoutePlan};
use super::surface::{Feature, FitBounds, FlyTo, Geometry, LayerKind, LayerSpec, MapSurface};
use super::theme::{Theme, CURRENT_COLOR};
use crate::points::{Point, PointId};

/// Raster source holding the basemap tiles
pub const BASEMAP_SOURCE: &str = "cartodb";
pub const PATH_SOURCE: &str = "path";
pub const PATH_LAYER: &str = "path-line";

pub const FIT_PADDING: f64 = 180.0;
pub const FIT_DURATION_MS: u64 = 800;
pub const FLY_ZOOM: f64 = 10.0;
pub const FLY_DURATION_MS: u64 = 1000;

const CURRENT_RADIUS: f64 = 12.0;
const MARKER_RADIUS: f64 = 8.0;
const PULSE_FRAME: Duration = Duration::from_millis(16);
const PULSE_STEP: f64 = 0.1;

/// Radius and opacity of the pulse halo at a phase
pub fn pulse_frame(phase: f64) -> (f64, f64) {
    let wave = phase.sin();
    (20.0 + wave * 5.0, 0.3 * (1.0 + wave * 0.5))
}

/// Map view bound to one surface
pub struct MapView<S: MapSurface + 'static> {
    surface: Arc<Mutex<S>>,
    theme: Theme,
    plan: RoutePlan,
    selected: Option<PointId>,
    pulse: Option<JoinHandle<()>>,
}

impl<S: MapSurface + 'static> MapView<S> {
    pub fn new(surface: Arc<Mutex<S>>, theme: Theme) -> Self {
        lock(&surface).set_tiles(BASEMAP_SOURCE, theme.basemap_tiles());
        Self {
            surface,
            theme,
            plan: RoutePlan::default(),
            selected: None,
            pulse: None,
        }
    }

    pub fn surface(&self) -> &Arc<Mutex<S>> {
        &self.surface
    }

    pub fn plan(&self) -> &RoutePlan {
        &self.plan
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_pulsing(&self) -> bool {
        self.pulse.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Redraw the journey from scratch
    pub fn render(&mut self, points: &[Point]) {
        self.stop_pulse();
        self.clear();

        self.plan = RoutePlan::from_points(points);
        if let Some(selected) = &self.selected {
            if self.plan.marker(selected).is_none() {
                self.selected = None;
            }
        }

        let Some(bounds) = self.plan.bounds else {
            tracing::debug!("Nothing to draw");
            return;
        };

        {
            let mut surface = lock(&self.surface);

            surface.add_source(
                PATH_SOURCE,
                Feature::new(
                    Geometry::LineString {
                        coordinates: self.plan.path.clone(),
                    },
                    json!({}),
                ),
            );
            surface.add_layer(self.path_layer());
            surface.fit_bounds(FitBounds {
                bounds,
                padding: FIT_PADDING,
                duration_ms: FIT_DURATION_MS,
            });

            for marker in &self.plan.markers {
                let layer_id = marker.layer_id();
                surface.add_source(
                    &layer_id,
                    Feature::new(
                        Geometry::Point {
                            coordinates: marker.position,
                        },
                        json!({
                            "id": marker.point_id,
                            "title": marker.title,
                            "isCurrent": marker.is_current,
                        }),
                    ),
                );
                surface.add_layer(self.marker_layer(marker));
            }

            if let Some(current) = self.plan.current() {
                surface.add_layer(pulse_layer(current));
            }
        }

        tracing::debug!(points = self.plan.markers.len(), "Rendered journey");
        self.start_pulse();
    }

    /// Handle a click on a layer. Returns the selected point when the layer is
    /// a marker.
    pub fn click(&mut self, layer_id: &str) -> Option<PointId> {
        let point_id = self.plan.point_for_layer(layer_id)?.to_string();
        self.select(Some(point_id.as_str()));
        self.fly_to(&point_id);
        Some(point_id)
    }

    /// Change the highlighted point. Only marker colors change.
    pub fn select(&mut self, point_id: Option<&str>) {
        self.selected = point_id
            .filter(|id| self.plan.marker(id).is_some())
            .map(str::to_string);
        self.recolor_markers();
    }

    /// Move the camera to a point
    pub fn fly_to(&self, point_id: &str) {
        if let Some(marker) = self.plan.marker(point_id) {
            lock(&self.surface).fly_to(FlyTo {
                center: marker.position,
                zoom: FLY_ZOOM,
                duration_ms: FLY_DURATION_MS,
            });
        }
    }

    /// Swap basemap tiles and recolor the route and markers
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        {
            let mut surface = lock(&self.surface);
            surface.set_tiles(BASEMAP_SOURCE, theme.basemap_tiles());
            if surface.has_layer(PATH_LAYER) {
                surface.set_paint(PATH_LAYER, "line-color", json!(theme.path_color()));
            }
        }
        self.recolor_markers();
        tracing::debug!(theme = %theme, "Theme changed");
    }

    /// Stop animating and remove everything this view drew
    pub fn unmount(&mut self) {
        self.stop_pulse();
        self.clear();
        self.plan = RoutePlan::default();
    }

    fn clear(&self) {
        let mut surface = lock(&self.surface);
        for marker in &self.plan.markers {
            let layer_id = marker.layer_id();
            let pulse_id = marker.pulse_layer_id();
            if surface.has_layer(&pulse_id) {
                surface.remove_layer(&pulse_id);
            }
            if surface.has_layer(&layer_id) {
                surface.remove_layer(&layer_id);
            }
            surface.remove_source(&layer_id);
        }
        if surface.has_layer(PATH_LAYER) {
            surface.remove_layer(PATH_LAYER);
        }
        surface.remove_source(PATH_SOURCE);
    }

    fn recolor_markers(&self) {
        let mut surface = lock(&self.surface);
        for marker in &self.plan.markers {
            let layer_id = marker.layer_id();
            if !surface.has_layer(&layer_id) {
                continue;
            }
            surface.set_paint(&layer_id, "circle-color", json!(self.marker_color(marker)));
            surface.set_paint(
                &layer_id,
                "circle-stroke-color",
                json!(self.theme.stroke_color()),
            );
        }
    }

    fn marker_color(&self, marker: &MarkerSpec) -> &'static str {
        if self.selected.as_deref() == Some(marker.point_id.as_str()) {
            self.theme.selected_color()
        } else if marker.is_current {
            CURRENT_COLOR
        } else {
            self.theme.marker_color()
        }
    }

    fn path_layer(&self) -> LayerSpec {
        LayerSpec {
            id: PATH_LAYER.to_string(),
            kind: LayerKind::Line,
            source: PATH_SOURCE.to_string(),
            layout: properties(json!({
                "line-join": "round",
                "line-cap": "round",
            })),
            paint: properties(json!({
                "line-color": self.theme.path_color(),
                "line-width": 3,
                "line-dasharray": [2, 2],
                "line-opacity": 0.7,
            })),
        }
    }

    fn marker_layer(&self, marker: &MarkerSpec) -> LayerSpec {
        let radius = if marker.is_current {
            CURRENT_RADIUS
        } else {
            MARKER_RADIUS
        };
        LayerSpec {
            id: marker.layer_id(),
            kind: LayerKind::Circle,
            source: marker.layer_id(),
            layout: Map::new(),
            paint: properties(json!({
                "circle-radius": radius,
                "circle-color": self.marker_color(marker),
                "circle-stroke-color": self.theme.stroke_color(),
                "circle-stroke-width": 3,
                "circle-opacity": 0.9,
            })),
        }
    }

    fn start_pulse(&mut self) {
        let Some(current) = self.plan.current() else {
            return;
        };
        let pulse_id = current.pulse_layer_id();
        let surface = Arc::clone(&self.surface);

        self.pulse = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PULSE_FRAME);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut phase = 0.0_f64;

            loop {
                ticker.tick().await;
                phase += PULSE_STEP;
                let (radius, opacity) = pulse_frame(phase);

                let mut surface = lock(&surface);
                if !surface.has_layer(&pulse_id) {
                    break;
                }
                surface.set_paint(&pulse_id, "circle-opacity", json!(opacity));
                surface.set_paint(&pulse_id, "circle-radius", json!(radius));
            }
        }));
    }

    fn stop_pulse(&mut self) {
        if let Some(task) = self.pulse.take() {
            task.abort();
        }
    }
}

impl<S: MapSurface + 'static> Drop for MapView<S> {
    fn drop(&mut self) {
        self.stop_pulse();
    }
}

fn pulse_layer(current: &MarkerSpec) -> LayerSpec {
    LayerSpec {
        id: current.pulse_layer_id(),
        kind: LayerKind::Circle,
        source: current.layer_id(),
        layout: Map::new(),
        paint: properties(json!({
            "circle-radius": 20,
            "circle-color": CURRENT_COLOR,
            "circle-opacity": 0.3,
            "circle-stroke-width": 0,
        })),
    }
}

fn properties(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn lock<S>(surface: &Mutex<S>) -> MutexGuard<'_, S> {
    match surface.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
