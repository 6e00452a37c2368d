//! Core data types for journey points
//!
//! - `Point`: a waypoint as stored and pushed to subscribers
//! - `NewPoint`: a validated insert
//! - `PointPatch`: the editable subset written by updates
//! - `JourneyId` and `Coordinates`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{StoreError, StoreResult};

/// Opaque point identifier assigned by the store
pub type PointId = String;

/// Image shown when a point has no cover
pub const DEFAULT_COVER: &str = "/images/default.png";

/// Journey used when none is configured
pub const DEFAULT_JOURNEY: &str = "camino";

const MAX_JOURNEY_ID_LEN: usize = 64;

/// Identifier of the journey a point belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JourneyId(String);

impl JourneyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short slug of letters, digits, `-` and `_`
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= MAX_JOURNEY_ID_LEN
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl Default for JourneyId {
    fn default() -> Self {
        Self::new(DEFAULT_JOURNEY)
    }
}

impl fmt::Display for JourneyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JourneyId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A WGS84 position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite and inside [-90, 90] x [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(StoreError::InvalidData(format!(
                "coordinates out of range: {}, {}",
                self.latitude, self.longitude
            )))
        }
    }

    /// Map libraries take `[longitude, latitude]`
    pub fn lng_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// A single journey waypoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: PointId,
    #[serde(default)]
    pub title: String,
    pub coordinates: Coordinates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    /// Authoritative for ordering and display
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Stamped by the store on insert
    pub created_at: DateTime<Utc>,
}

impl Point {
    /// Cover image, falling back to the placeholder
    pub fn cover_or_default(&self) -> &str {
        self.cover
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_COVER)
    }

    /// External link, if one is set and not cleared
    pub fn link(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn has_title(&self) -> bool {
        !self.title.is_empty()
    }
}

/// Sort into journey order: ascending timestamp, then creation order
pub fn sort_points(points: &mut [Point]) {
    points.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

/// A point ready to be written. Optional fields are already trimmed and empty
/// ones dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub coordinates: Coordinates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl NewPoint {
    pub fn new(coordinates: Coordinates, timestamp: DateTime<Utc>) -> Self {
        Self {
            title: None,
            coordinates,
            cover: None,
            timestamp,
            url: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn cover(mut self, cover: impl Into<String>) -> Self {
        self.cover = Some(cover.into());
        self
    }

    pub fn validate(&self) -> StoreResult<()> {
        self.coordinates.validate()
    }

    /// Materialize into a stored point
    pub fn into_point(self, id: PointId, created_at: DateTime<Utc>) -> Point {
        Point {
            id,
            title: self.title.unwrap_or_default(),
            coordinates: self.coordinates,
            cover: self.cover,
            timestamp: self.timestamp,
            url: self.url,
            created_at,
        }
    }
}

/// Fields an update writes. Empty strings clear title/url.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPatch {
    pub title: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

impl PointPatch {
    pub fn apply(&self, point: &mut Point) {
        point.title = self.title.clone();
        point.url = Some(self.url.clone());
        point.timestamp = self.timestamp;
    }
}

/// Fresh opaque id
pub fn new_point_id() -> PointId {
    uuid::Uuid::new_v4().simple().to_string()
}
