//! Point store abstraction and snapshot feeds
//!
//! A store keeps the points of every journey and pushes the full ordered list
//! to live queries whenever a journey changes.

use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use super::error::{StoreError, StoreResult};
use super::types::{JourneyId, NewPoint, Point, PointId, PointPatch};

/// Stream of full snapshots, ascending by timestamp. The first item is the
/// state at the time the query was opened.
pub type LiveQuery = BoxStream<'static, StoreResult<Vec<Point>>>;

/// A collection of point records per journey
#[async_trait]
pub trait PointStore: Send + Sync {
    /// Short backend name for logs and health output
    fn name(&self) -> &str;

    /// Current points of a journey, ascending by timestamp
    async fn list(&self, journey: &JourneyId) -> StoreResult<Vec<Point>>;

    /// Open a live query on a journey
    async fn watch(&self, journey: &JourneyId) -> StoreResult<LiveQuery>;

    /// Insert a point. The store assigns the id and `created_at`.
    async fn insert(&self, journey: &JourneyId, point: NewPoint) -> StoreResult<PointId>;

    /// Overwrite title, url and timestamp of an existing point
    async fn update(&self, journey: &JourneyId, id: &str, patch: PointPatch) -> StoreResult<()>;
}

type Snapshot = Arc<Vec<Point>>;

/// Per-journey snapshot channels shared by the local store backends
///
/// Loads happen under the feed lock so a snapshot published by a writer is
/// never older than one a concurrent subscriber loaded.
#[derive(Default)]
pub(crate) struct JourneyFeeds {
    senders: Mutex<HashMap<JourneyId, watch::Sender<Snapshot>>>,
}

impl JourneyFeeds {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Open a live query, loading the initial snapshot if nobody watches yet
    pub(crate) fn subscribe<F>(&self, journey: &JourneyId, load: F) -> StoreResult<LiveQuery>
    where
        F: FnOnce() -> StoreResult<Vec<Point>>,
    {
        let mut senders = self.lock()?;

        if let Some(sender) = senders.get(journey) {
            return Ok(live_query(sender.subscribe()));
        }

        let (sender, receiver) = watch::channel(Arc::new(load()?));
        senders.insert(journey.clone(), sender);

        tracing::debug!(journey = %journey, "Opened snapshot feed");
        Ok(live_query(receiver))
    }

    /// Push a fresh snapshot to every live query on the journey
    pub(crate) fn publish<F>(&self, journey: &JourneyId, load: F) -> StoreResult<()>
    where
        F: FnOnce() -> StoreResult<Vec<Point>>,
    {
        let mut senders = self.lock()?;

        let Some(sender) = senders.get(journey) else {
            return Ok(());
        };

        if sender.receiver_count() == 0 {
            senders.remove(journey);
            tracing::debug!(journey = %journey, "Closed idle snapshot feed");
            return Ok(());
        }

        let snapshot = load()?;
        let count = snapshot.len();
        sender.send_replace(Arc::new(snapshot));

        tracing::trace!(journey = %journey, points = count, "Published snapshot");
        Ok(())
    }

    fn lock(
        &self,
    ) -> StoreResult<std::sync::MutexGuard<'_, HashMap<JourneyId, watch::Sender<Snapshot>>>> {
        self.senders
            .lock()
            .map_err(|e| StoreError::Database(format!("feed lock poisoned: {}", e)))
    }
}

/// Turn a snapshot receiver into a live query
fn live_query(receiver: watch::Receiver<Snapshot>) -> LiveQuery {
    futures_util::stream::unfold((receiver, true), |(mut receiver, first)| async move {
        if !first && receiver.changed().await.is_err() {
            return None;
        }
        let snapshot = (**receiver.borrow_and_update()).clone();
        Some((Ok(snapshot), (receiver, false)))
    })
    .boxed()
}
