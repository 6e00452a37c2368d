//! Route planning
//!
//! Turns an ordered point list into the geometry the map draws: the path,
//! the camera bounds and one marker per point.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::points::{Coordinates, Point, PointId};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Axis-aligned box in `[longitude, latitude]` space
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    /// South-west corner
    pub min: [f64; 2],
    /// North-east corner
    pub max: [f64; 2],
}

impl Bounds {
    fn around(lng_lat: [f64; 2]) -> Self {
        Self {
            min: lng_lat,
            max: lng_lat,
        }
    }

    /// Grow to include a position
    pub fn extend(&mut self, lng_lat: [f64; 2]) {
        self.min[0] = self.min[0].min(lng_lat[0]);
        self.min[1] = self.min[1].min(lng_lat[1]);
        self.max[0] = self.max[0].max(lng_lat[0]);
        self.max[1] = self.max[1].max(lng_lat[1]);
    }

    pub fn contains(&self, lng_lat: [f64; 2]) -> bool {
        (self.min[0]..=self.max[0]).contains(&lng_lat[0])
            && (self.min[1]..=self.max[1]).contains(&lng_lat[1])
    }

    pub fn center(&self) -> [f64; 2] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
        ]
    }
}

/// What the map needs to know about one point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub point_id: PointId,
    pub title: String,
    pub position: [f64; 2],
    pub is_current: bool,
}

impl MarkerSpec {
    /// Layer and source id of the marker
    pub fn layer_id(&self) -> String {
        marker_layer_id(&self.point_id)
    }

    pub fn pulse_layer_id(&self) -> String {
        format!("{}-pulse", self.layer_id())
    }
}

pub fn marker_layer_id(point_id: &str) -> String {
    format!("pin-{}", point_id)
}

/// Geometry for one render of a journey
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RoutePlan {
    /// `[longitude, latitude]` pairs in journey order
    pub path: Vec<[f64; 2]>,
    pub bounds: Option<Bounds>,
    pub markers: Vec<MarkerSpec>,
}

impl RoutePlan {
    /// Plan a route from points already in journey order. The last point is
    /// the current one.
    pub fn from_points(points: &[Point]) -> Self {
        let path: Vec<[f64; 2]> = points.iter().map(|p| p.coordinates.lng_lat()).collect();

        let bounds = path.split_first().map(|(first, rest)| {
            let mut bounds = Bounds::around(*first);
            for position in rest {
                bounds.extend(*position);
            }
            bounds
        });

        let last = points.len().saturating_sub(1);
        let markers = points
            .iter()
            .enumerate()
            .map(|(i, p)| MarkerSpec {
                point_id: p.id.clone(),
                title: p.title.clone(),
                position: p.coordinates.lng_lat(),
                is_current: i == last,
            })
            .collect();

        Self {
            path,
            bounds,
            markers,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn current(&self) -> Option<&MarkerSpec> {
        self.markers.iter().find(|m| m.is_current)
    }

    pub fn marker(&self, point_id: &str) -> Option<&MarkerSpec> {
        self.markers.iter().find(|m| m.point_id == point_id)
    }

    /// Point id behind a marker layer id
    pub fn point_for_layer(&self, layer_id: &str) -> Option<&str> {
        self.markers
            .iter()
            .find(|m| m.layer_id() == layer_id)
            .map(|m| m.point_id.as_str())
    }
}

/// Great-circle distance in kilometres
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Header figures for a journey
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JourneySummary {
    pub points: usize,
    /// 1-based day of the journey the latest point falls on
    pub day: i64,
    pub distance_km: f64,
    pub started: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

impl JourneySummary {
    pub fn from_points(points: &[Point]) -> Self {
        let distance_km = points
            .windows(2)
            .map(|pair| haversine_km(pair[0].coordinates, pair[1].coordinates))
            .sum();

        let started = points.first().map(|p| p.timestamp);
        let latest = points.last().map(|p| p.timestamp);
        let day = match (started, latest) {
            (Some(first), Some(last)) => (last.date_naive() - first.date_naive()).num_days() + 1,
            _ => 0,
        };

        Self {
            points: points.len(),
            day,
            distance_km,
            started,
            latest,
        }
    }

    /// e.g. `Day 4 · 57 km`
    pub fn headline(&self) -> String {
        format!("Day {} · {:.0} km", self.day, self.distance_km)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::NewPoint;
    use chrono::TimeZone;

    fn stage(id: &str, lat: f64, lon: f64, day: u32) -> Point {
        let ts = Utc.with_ymd_and_hms(2025, 4, day, 17, 0, 0).unwrap();
        NewPoint::new(Coordinates::new(lat, lon), ts)
            .title(id)
            .into_point(id.to_string(), ts)
    }

    fn camino() -> Vec<Point> {
        vec![
            stage("vlissingen", 51.442, 3.573, 26),
            stage("watervliet", 51.257, 3.642, 27),
            stage("eeklo", 51.186, 3.556, 28),
            stage("gent", 51.054, 3.717, 29),
        ]
    }

    #[test]
    fn test_path_is_lng_lat_in_order() {
        let plan = RoutePlan::from_points(&camino());
        assert_eq!(plan.path.len(), 4);
        assert_eq!(plan.path[0], [3.573, 51.442]);
        assert_eq!(plan.path[3], [3.717, 51.054]);
    }

    #[test]
    fn test_bounds_cover_every_point() {
        let plan = RoutePlan::from_points(&camino());
        let bounds = plan.bounds.unwrap();
        assert_eq!(bounds.min, [3.556, 51.054]);
        assert_eq!(bounds.max, [3.717, 51.442]);
        for position in &plan.path {
            assert!(bounds.contains(*position));
        }
    }

    #[test]
    fn test_only_last_marker_is_current() {
        let plan = RoutePlan::from_points(&camino());
        let current: Vec<_> = plan.markers.iter().filter(|m| m.is_current).collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].point_id, "gent");
        assert_eq!(plan.point_for_layer("pin-eeklo"), Some("eeklo"));
        assert_eq!(plan.current().unwrap().pulse_layer_id(), "pin-gent-pulse");
    }

    #[test]
    fn test_empty_plan() {
        let plan = RoutePlan::from_points(&[]);
        assert!(plan.is_empty());
        assert!(plan.bounds.is_none());
        assert!(plan.current().is_none());
    }

    #[test]
    fn test_single_point_bounds_collapse() {
        let plan = RoutePlan::from_points(&camino()[..1]);
        let bounds = plan.bounds.unwrap();
        assert_eq!(bounds.min, bounds.max);
        assert!(plan.markers[0].is_current);
    }

    #[test]
    fn test_summary() {
        let summary = JourneySummary::from_points(&camino());
        assert_eq!(summary.points, 4);
        assert_eq!(summary.day, 4);
        assert!(summary.distance_km > 45.0 && summary.distance_km < 60.0);
        assert!(summary.headline().starts_with("Day 4 · "));

        let empty = JourneySummary::from_points(&[]);
        assert_eq!(empty.day, 0);
        assert_eq!(empty.distance_km, 0.0);
    }
}
