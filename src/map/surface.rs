//! The drawing surface a [`MapView`](super::MapView) drives
//!
//! `MapSurface` is the small slice of a style-based web map (sources, layers,
//! paint properties, camera) the journey view needs. [`SceneGraph`] is an
//! in-process surface that records the resulting scene.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::route::Bounds;

/// Paint or layout properties, keyed by style property name
pub type Properties = Map<String, Value>;

/// GeoJSON geometry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    LineString { coordinates: Vec<[f64; 2]> },
}

/// GeoJSON feature used as a source's data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: Value,
    pub geometry: Geometry,
}

impl Feature {
    pub fn new(geometry: Geometry, properties: Value) -> Self {
        Self {
            kind: "Feature",
            properties,
            geometry,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Line,
    Circle,
}

/// A style layer drawing one source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub source: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub layout: Properties,
    pub paint: Properties,
}

/// Camera move that frames a box
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitBounds {
    pub bounds: Bounds,
    pub padding: f64,
    pub duration_ms: u64,
}

/// Animated camera move to a position
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlyTo {
    pub center: [f64; 2],
    pub zoom: f64,
    pub duration_ms: u64,
}

/// A map instance that can hold sources and layers
pub trait MapSurface: Send {
    fn add_source(&mut self, id: &str, data: Feature);
    fn remove_source(&mut self, id: &str);
    fn add_layer(&mut self, layer: LayerSpec);
    fn remove_layer(&mut self, id: &str);
    fn has_layer(&self, id: &str) -> bool;
    fn set_paint(&mut self, layer_id: &str, property: &str, value: Value);
    fn fit_bounds(&mut self, fit: FitBounds);
    fn fly_to(&mut self, target: FlyTo);
    /// Replace the tile URLs of a raster source
    fn set_tiles(&mut self, source_id: &str, tiles: Vec<String>);
}

/// Camera moves as they were requested
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CameraMove {
    FitBounds(FitBounds),
    FlyTo(FlyTo),
}

/// Surface that keeps the scene in memory
#[derive(Debug, Clone, Default, Serialize)]
pub struct SceneGraph {
    pub sources: BTreeMap<String, Feature>,
    /// Layers in draw order
    pub layers: Vec<LayerSpec>,
    pub tiles: BTreeMap<String, Vec<String>>,
    pub camera: Vec<CameraMove>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn paint(&self, layer_id: &str, property: &str) -> Option<&Value> {
        self.layer(layer_id).and_then(|l| l.paint.get(property))
    }

    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }
}

impl MapSurface for SceneGraph {
    fn add_source(&mut self, id: &str, data: Feature) {
        self.sources.insert(id.to_string(), data);
    }

    fn remove_source(&mut self, id: &str) {
        self.sources.remove(id);
    }

    fn add_layer(&mut self, layer: LayerSpec) {
        self.layers.retain(|l| l.id != layer.id);
        self.layers.push(layer);
    }

    fn remove_layer(&mut self, id: &str) {
        self.layers.retain(|l| l.id != id);
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layer(id).is_some()
    }

    fn set_paint(&mut self, layer_id: &str, property: &str, value: Value) {
        if let Some(layer) = self.layers.iter_mut().find(|l| l.id == layer_id) {
            layer.paint.insert(property.to_string(), value);
        }
    }

    fn fit_bounds(&mut self, fit: FitBounds) {
        self.camera.push(CameraMove::FitBounds(fit));
    }

    fn fly_to(&mut self, target: FlyTo) {
        self.camera.push(CameraMove::FlyTo(target));
    }

    fn set_tiles(&mut self, source_id: &str, tiles: Vec<String>) {
        self.tiles.insert(source_id.to_string(), tiles);
    }
}
