//! In-memory point store
//!
//! Keeps every journey in a `HashMap` behind a mutex. Used for tests and for
//! running the API server without a database.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::error::{StoreError, StoreResult};
use super::store::{JourneyFeeds, LiveQuery, PointStore};
use super::types::{new_point_id, sort_points, JourneyId, NewPoint, Point, PointId, PointPatch};
use crate::clock::{Clock, SystemClock};

/// Point store held entirely in memory
pub struct MemoryPointStore {
    journeys: Mutex<HashMap<JourneyId, Vec<Point>>>,
    feeds: JourneyFeeds,
    clock: Arc<dyn Clock>,
}

impl MemoryPointStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            journeys: Mutex::new(HashMap::new()),
            feeds: JourneyFeeds::new(),
            clock,
        }
    }

    fn snapshot(&self, journey: &JourneyId) -> StoreResult<Vec<Point>> {
        let journeys = self.lock()?;
        Ok(journeys.get(journey).cloned().unwrap_or_default())
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<JourneyId, Vec<Point>>>> {
        self.journeys
            .lock()
            .map_err(|e| StoreError::Database(format!("store lock poisoned: {}", e)))
    }
}

impl Default for MemoryPointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PointStore for MemoryPointStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(&self, journey: &JourneyId) -> StoreResult<Vec<Point>> {
        self.snapshot(journey)
    }

    async fn watch(&self, journey: &JourneyId) -> StoreResult<LiveQuery> {
        self.feeds.subscribe(journey, || self.snapshot(journey))
    }

    async fn insert(&self, journey: &JourneyId, point: NewPoint) -> StoreResult<PointId> {
        point.validate()?;

        let id = new_point_id();
        let stored = point.into_point(id.clone(), self.clock.now());
        {
            let mut journeys = self.lock()?;
            let points = journeys.entry(journey.clone()).or_default();
            points.push(stored);
            sort_points(points);
        }

        tracing::debug!(journey = %journey, point_id = %id, "Inserted point");
        self.feeds.publish(journey, || self.snapshot(journey))?;
        Ok(id)
    }

    async fn update(&self, journey: &JourneyId, id: &str, patch: PointPatch) -> StoreResult<()> {
        {
            let mut journeys = self.lock()?;
            let point = journeys
                .get_mut(journey)
                .and_then(|points| points.iter_mut().find(|p| p.id == id))
                .ok_or_else(|| StoreError::NotFound {
                    journey: journey.to_string(),
                    id: id.to_string(),
                })?;
            patch.apply(point);

            if let Some(points) = journeys.get_mut(journey) {
                sort_points(points);
            }
        }

        tracing::debug!(journey = %journey, point_id = %id, "Updated point");
        self.feeds.publish(journey, || self.snapshot(journey))
    }
}
