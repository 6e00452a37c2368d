//! Point synchronization service
//!
//! `PointSync` mirrors one journey's points from a store into an observable
//! [`SyncState`] and routes add/edit requests back to the store. The store's
//! push is the only way points reach the local list.

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::error::{SyncError, SyncResult};
use crate::clock::Clock;
use crate::points::{Coordinates, JourneyId, NewPoint, Point, PointId, PointPatch, PointStore};

/// Observable state of the synchronized list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncState {
    /// Ascending by timestamp
    pub points: Vec<Point>,
    /// A subscription waits for its first snapshot or a write is in flight
    pub loading: bool,
    pub error: Option<String>,
    /// When the last snapshot arrived
    pub last_synced: Option<DateTime<Utc>>,
    pending_loads: usize,
    pending_writes: usize,
}

impl SyncState {
    fn refresh_loading(&mut self) {
        self.loading = self.pending_loads > 0 || self.pending_writes > 0;
    }

    fn load_started(&mut self) {
        self.pending_loads += 1;
        self.refresh_loading();
    }

    fn load_settled(&mut self) {
        self.pending_loads = self.pending_loads.saturating_sub(1);
        self.refresh_loading();
    }

    fn write_started(&mut self) {
        self.pending_writes += 1;
        self.refresh_loading();
    }

    fn write_settled(&mut self) {
        self.pending_writes = self.pending_writes.saturating_sub(1);
        self.refresh_loading();
    }

    /// The most recent point of the journey
    pub fn current_point(&self) -> Option<&Point> {
        self.points.last()
    }
}

/// Input for [`PointSync::add_point`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointDraft {
    pub title: String,
    pub coordinates: Option<Coordinates>,
    pub cover: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub url: String,
}

/// Input for [`PointSync::update_point`]. Empty strings clear a field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateDraft {
    pub title: String,
    pub url: String,
    pub timestamp: Option<DateTime<Utc>>,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Keeps a local copy of a journey in step with the store
pub struct PointSync {
    store: Arc<dyn PointStore>,
    clock: Arc<dyn Clock>,
    state: Arc<watch::Sender<SyncState>>,
}

impl PointSync {
    pub fn new(store: Arc<dyn PointStore>, clock: Arc<dyn Clock>) -> Self {
        let (state, _) = watch::channel(SyncState::default());
        Self {
            store,
            clock,
            state: Arc::new(state),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Receiver that wakes on every state change
    pub fn watch(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn current_point(&self) -> Option<Point> {
        self.state.borrow().current_point().cloned()
    }

    /// Start mirroring a journey. Every snapshot replaces the local list until
    /// the returned [`Subscription`] is cancelled or dropped.
    pub fn subscribe(&self, journey: &JourneyId) -> Subscription {
        self.state.send_modify(|s| {
            s.load_started();
            s.error = None;
        });

        let flags = Arc::new(Mutex::new(SubscriptionFlags {
            active: true,
            awaiting_first: true,
        }));
        let task = tokio::spawn(run_subscription(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            Arc::clone(&self.state),
            Arc::clone(&flags),
            journey.clone(),
        ));

        tracing::debug!(journey = %journey, "Subscribed to journey points");
        Subscription {
            flags,
            state: Arc::clone(&self.state),
            task: Some(task),
        }
    }

    /// Create a point. The store assigns the id and creation time, the new
    /// point shows up through the subscription.
    pub async fn add_point(&self, journey: &JourneyId, draft: PointDraft) -> SyncResult<PointId> {
        let coordinates = draft
            .coordinates
            .ok_or_else(|| SyncError::Validation("coordinates are required".to_string()))?;
        let timestamp = draft
            .timestamp
            .ok_or_else(|| SyncError::Validation("timestamp is required".to_string()))?;
        if !coordinates.is_valid() {
            return Err(SyncError::Validation(format!(
                "coordinates out of range: {}",
                coordinates
            )));
        }

        let point = NewPoint {
            title: non_empty(&draft.title),
            coordinates,
            cover: non_empty(&draft.cover),
            timestamp,
            url: non_empty(&draft.url),
        };

        self.begin_mutation();
        let result = self.store.insert(journey, point).await;
        let id = self.finish_mutation(result)?;

        tracing::info!(journey = %journey, point_id = %id, "Point added");
        Ok(id)
    }

    /// Overwrite title, url and timestamp of a point
    pub async fn update_point(
        &self,
        journey: &JourneyId,
        id: &str,
        draft: UpdateDraft,
    ) -> SyncResult<()> {
        if id.trim().is_empty() {
            return Err(SyncError::Validation("point id is required".to_string()));
        }
        let timestamp = draft
            .timestamp
            .ok_or_else(|| SyncError::Validation("timestamp is required".to_string()))?;

        let patch = PointPatch {
            title: draft.title.trim().to_string(),
            url: draft.url.trim().to_string(),
            timestamp,
        };

        self.begin_mutation();
        let result = self.store.update(journey, id, patch).await;
        self.finish_mutation(result)?;

        tracing::info!(journey = %journey, point_id = %id, "Point updated");
        Ok(())
    }

    fn begin_mutation(&self) {
        self.state.send_modify(|s| {
            s.write_started();
            s.error = None;
        });
    }

    fn finish_mutation<T>(&self, result: crate::points::StoreResult<T>) -> SyncResult<T> {
        match result {
            Ok(value) => {
                self.state.send_modify(|s| s.write_settled());
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Point write failed");
                let err = SyncError::from(e);
                let message = err.to_string();
                self.state.send_modify(|s| {
                    s.write_settled();
                    s.error = Some(message);
                });
                Err(err)
            }
        }
    }
}

struct SubscriptionFlags {
    active: bool,
    /// Still counted in the state's pending loads
    awaiting_first: bool,
}

fn lock_flags(flags: &Mutex<SubscriptionFlags>) -> std::sync::MutexGuard<'_, SubscriptionFlags> {
    match flags.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Apply a state change only while the subscription is active. The first
/// result settles the subscription's initial load. Returns false once it was
/// cancelled.
fn apply_if_active(
    flags: &Mutex<SubscriptionFlags>,
    state: &watch::Sender<SyncState>,
    change: impl FnOnce(&mut SyncState),
) -> bool {
    let mut guard = lock_flags(flags);
    if !guard.active {
        return false;
    }
    let first = std::mem::replace(&mut guard.awaiting_first, false);
    state.send_modify(|s| {
        change(s);
        if first {
            s.load_settled();
        }
    });
    true
}

async fn run_subscription(
    store: Arc<dyn PointStore>,
    clock: Arc<dyn Clock>,
    state: Arc<watch::Sender<SyncState>>,
    flags: Arc<Mutex<SubscriptionFlags>>,
    journey: JourneyId,
) {
    let mut query = match store.watch(&journey).await {
        Ok(query) => query,
        Err(e) => {
            tracing::warn!(journey = %journey, error = %e, "Could not open live query");
            let message = e.to_string();
            apply_if_active(&flags, &state, |s| {
                s.error = Some(message);
            });
            return;
        }
    };

    while let Some(item) = query.next().await {
        let applied = match item {
            Ok(points) => {
                let count = points.len();
                let now = clock.now();
                let applied = apply_if_active(&flags, &state, |s| {
                    s.points = points;
                    s.error = None;
                    s.last_synced = Some(now);
                });
                if applied {
                    tracing::debug!(journey = %journey, points = count, "Applied snapshot");
                }
                applied
            }
            Err(e) => {
                tracing::warn!(journey = %journey, error = %e, "Live query error");
                let message = e.to_string();
                apply_if_active(&flags, &state, |s| {
                    s.error = Some(message);
                })
            }
        };

        if !applied {
            break;
        }
    }
}

/// Handle of a running subscription. Dropping it cancels.
pub struct Subscription {
    flags: Arc<Mutex<SubscriptionFlags>>,
    state: Arc<watch::Sender<SyncState>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stop applying snapshots. No state change happens after this returns.
    pub fn cancel(&mut self) {
        {
            let mut flags = lock_flags(&self.flags);
            if flags.active && flags.awaiting_first {
                self.state.send_modify(|s| s.load_settled());
            }
            flags.active = false;
            flags.awaiting_first = false;
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::points::{LiveQuery, MemoryPointStore, StoreError, StoreResult};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, day, hour, 0, 0).unwrap()
    }

    fn draft(title: &str, lat: f64, lon: f64, ts: DateTime<Utc>) -> PointDraft {
        PointDraft {
            title: title.to_string(),
            coordinates: Some(Coordinates::new(lat, lon)),
            timestamp: Some(ts),
            ..Default::default()
        }
    }

    async fn wait_for<F>(rx: &mut watch::Receiver<SyncState>, mut pred: F) -> SyncState
    where
        F: FnMut(&SyncState) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                {
                    let state = rx.borrow_and_update();
                    if pred(&state) {
                        return state.clone();
                    }
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("state never matched")
    }

    /// Store whose live query is driven by the test
    struct ScriptedStore {
        feed: Mutex<Option<mpsc::UnboundedReceiver<StoreResult<Vec<Point>>>>>,
        writes: AtomicUsize,
        fail_writes: bool,
    }

    impl ScriptedStore {
        fn new(fail_writes: bool) -> (Arc<Self>, mpsc::UnboundedSender<StoreResult<Vec<Point>>>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let store = Arc::new(Self {
                feed: Mutex::new(Some(rx)),
                writes: AtomicUsize::new(0),
                fail_writes,
            });
            (store, tx)
        }
    }

    #[async_trait]
    impl PointStore for ScriptedStore {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn list(&self, _journey: &JourneyId) -> StoreResult<Vec<Point>> {
            Ok(vec![])
        }

        async fn watch(&self, _journey: &JourneyId) -> StoreResult<LiveQuery> {
            let rx = self
                .feed
                .lock()
                .unwrap()
                .take()
                .ok_or(StoreError::Transport("feed already taken".into()))?;
            Ok(futures_util::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed())
        }

        async fn insert(&self, _journey: &JourneyId, _point: NewPoint) -> StoreResult<PointId> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                Err(StoreError::PermissionDenied)
            } else {
                Ok("new".to_string())
            }
        }

        async fn update(&self, _: &JourneyId, _: &str, _: PointPatch) -> StoreResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                Err(StoreError::PermissionDenied)
            } else {
                Ok(())
            }
        }
    }

    fn point(id: &str, ts: DateTime<Utc>) -> Point {
        NewPoint::new(Coordinates::new(51.0, 3.0), ts).into_point(id.to_string(), ts)
    }

    #[tokio::test]
    async fn test_subscribe_mirrors_store() {
        let clock = Arc::new(ManualClock::new(at(1, 0)));
        let store = Arc::new(MemoryPointStore::new());
        let sync = PointSync::new(store, clock);
        let journey = JourneyId::default();

        let mut rx = sync.watch();
        let _sub = sync.subscribe(&journey);
        assert!(sync.state().loading);

        let state = wait_for(&mut rx, |s| !s.loading).await;
        assert!(state.points.is_empty());
        assert_eq!(state.last_synced, Some(at(1, 0)));

        sync.add_point(&journey, draft("Gent", 51.05, 3.72, at(29, 9)))
            .await
            .unwrap();
        let state = wait_for(&mut rx, |s| s.points.len() == 1).await;
        assert_eq!(state.points[0].title, "Gent");
        assert_eq!(sync.current_point().unwrap().title, "Gent");
    }

    #[tokio::test]
    async fn test_points_follow_timestamp_not_creation_order() {
        let store = Arc::new(MemoryPointStore::new());
        let sync = PointSync::new(store, Arc::new(ManualClock::new(at(1, 0))));
        let journey = JourneyId::default();
        let mut rx = sync.watch();
        let _sub = sync.subscribe(&journey);

        sync.add_point(&journey, draft("third", 51.0, 3.7, at(29, 9))).await.unwrap();
        sync.add_point(&journey, draft("first", 51.4, 3.5, at(26, 9))).await.unwrap();
        sync.add_point(&journey, draft("second", 51.2, 3.6, at(27, 9))).await.unwrap();

        let state = wait_for(&mut rx, |s| s.points.len() == 3).await;
        let titles: Vec<_> = state.points.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
        assert_eq!(state.current_point().unwrap().title, "third");
    }

    #[tokio::test]
    async fn test_no_updates_after_cancel() {
        let (store, feed) = ScriptedStore::new(false);
        let sync = PointSync::new(store, Arc::new(ManualClock::new(at(1, 0))));
        let mut rx = sync.watch();
        let mut sub = sync.subscribe(&JourneyId::default());

        feed.send(Ok(vec![point("a", at(26, 8))])).unwrap();
        wait_for(&mut rx, |s| s.points.len() == 1).await;

        sub.cancel();
        assert!(!sub.is_active());
        let before = sync.state();

        let _ = feed.send(Ok(vec![point("a", at(26, 8)), point("b", at(27, 8))]));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sync.state(), before);
    }

    #[tokio::test]
    async fn test_live_query_error_sets_error_slot() {
        let (store, feed) = ScriptedStore::new(false);
        let sync = PointSync::new(store, Arc::new(ManualClock::new(at(1, 0))));
        let mut rx = sync.watch();
        let _sub = sync.subscribe(&JourneyId::default());

        feed.send(Err(StoreError::PermissionDenied)).unwrap();
        let state = wait_for(&mut rx, |s| s.error.is_some()).await;
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("Permission denied"));

        feed.send(Ok(vec![point("a", at(26, 8))])).unwrap();
        let state = wait_for(&mut rx, |s| !s.points.is_empty()).await;
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn test_add_requires_coordinates_and_timestamp() {
        let (store, _feed) = ScriptedStore::new(false);
        let sync = PointSync::new(store.clone(), Arc::new(ManualClock::new(at(1, 0))));
        let journey = JourneyId::default();

        let missing_coords = PointDraft {
            timestamp: Some(at(26, 8)),
            ..Default::default()
        };
        let missing_time = PointDraft {
            coordinates: Some(Coordinates::new(51.0, 3.0)),
            ..Default::default()
        };
        let out_of_range = draft("x", 91.0, 3.0, at(26, 8));

        for bad in [missing_coords, missing_time, out_of_range] {
            let result = sync.add_point(&journey, bad).await;
            assert!(matches!(result, Err(SyncError::Validation(_))));
        }
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
        assert_eq!(sync.state().error, None);
    }

    #[tokio::test]
    async fn test_add_trims_optional_fields() {
        let store = Arc::new(MemoryPointStore::new());
        let sync = PointSync::new(store.clone(), Arc::new(ManualClock::new(at(1, 0))));
        let journey = JourneyId::default();

        let mut input = draft("  Eeklo  ", 51.18, 3.56, at(28, 9));
        input.url = "   ".to_string();
        input.cover = " /images/eeklo.jpg ".to_string();
        sync.add_point(&journey, input).await.unwrap();

        let stored = &store.list(&journey).await.unwrap()[0];
        assert_eq!(stored.title, "Eeklo");
        assert_eq!(stored.url, None);
        assert_eq!(stored.cover.as_deref(), Some("/images/eeklo.jpg"));
    }

    #[tokio::test]
    async fn test_update_with_empty_title_clears_it() {
        let store = Arc::new(MemoryPointStore::new());
        let sync = PointSync::new(store.clone(), Arc::new(ManualClock::new(at(1, 0))));
        let journey = JourneyId::default();

        let mut input = draft("Watervliet", 51.28, 3.63, at(27, 9));
        input.url = "https://example.com/watervliet".to_string();
        let id = sync.add_point(&journey, input).await.unwrap();

        sync.update_point(
            &journey,
            &id,
            UpdateDraft {
                title: String::new(),
                url: String::new(),
                timestamp: Some(at(27, 18)),
            },
        )
        .await
        .unwrap();

        let stored = &store.list(&journey).await.unwrap()[0];
        assert_eq!(stored.title, "");
        assert_eq!(stored.url.as_deref(), Some(""));
        assert_eq!(stored.timestamp, at(27, 18));
    }

    #[tokio::test]
    async fn test_update_requires_id_and_timestamp() {
        let (store, _feed) = ScriptedStore::new(false);
        let sync = PointSync::new(store.clone(), Arc::new(ManualClock::new(at(1, 0))));
        let journey = JourneyId::default();

        let no_id = sync
            .update_point(
                &journey,
                " ",
                UpdateDraft {
                    timestamp: Some(at(26, 8)),
                    ..Default::default()
                },
            )
            .await;
        let no_time = sync
            .update_point(&journey, "abc", UpdateDraft::default())
            .await;

        assert!(matches!(no_id, Err(SyncError::Validation(_))));
        assert!(matches!(no_time, Err(SyncError::Validation(_))));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    /// Store whose first insert waits until released
    struct SlowStore {
        release: tokio::sync::Notify,
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl PointStore for SlowStore {
        fn name(&self) -> &str {
            "slow"
        }

        async fn list(&self, _journey: &JourneyId) -> StoreResult<Vec<Point>> {
            Ok(vec![])
        }

        async fn watch(&self, _journey: &JourneyId) -> StoreResult<LiveQuery> {
            Ok(futures_util::stream::pending().boxed())
        }

        async fn insert(&self, _journey: &JourneyId, _point: NewPoint) -> StoreResult<PointId> {
            let n = self.inserts.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                self.release.notified().await;
            }
            Ok(format!("p{}", n))
        }

        async fn update(&self, _: &JourneyId, _: &str, _: PointPatch) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_loading_holds_while_any_write_is_pending() {
        let store = Arc::new(SlowStore {
            release: tokio::sync::Notify::new(),
            inserts: AtomicUsize::new(0),
        });
        let sync = Arc::new(PointSync::new(store.clone(), Arc::new(ManualClock::new(at(1, 0)))));
        let journey = JourneyId::default();

        let slow = tokio::spawn({
            let sync = Arc::clone(&sync);
            let journey = journey.clone();
            async move { sync.add_point(&journey, draft("slow", 51.0, 3.0, at(26, 8))).await }
        });
        tokio::time::timeout(Duration::from_secs(2), async {
            while store.inserts.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        sync.add_point(&journey, draft("fast", 51.1, 3.1, at(27, 8)))
            .await
            .unwrap();
        assert!(sync.state().loading);

        store.release.notify_one();
        assert_eq!(slow.await.unwrap().unwrap(), "p0");
        assert!(!sync.state().loading);
    }

    #[tokio::test]
    async fn test_write_does_not_end_initial_load() {
        let (store, feed) = ScriptedStore::new(false);
        let sync = PointSync::new(store, Arc::new(ManualClock::new(at(1, 0))));
        let mut rx = sync.watch();
        let _sub = sync.subscribe(&JourneyId::default());

        sync.add_point(&JourneyId::default(), draft("x", 51.0, 3.0, at(26, 8)))
            .await
            .unwrap();
        assert!(sync.state().loading);

        feed.send(Ok(vec![point("x", at(26, 8))])).unwrap();
        let state = wait_for(&mut rx, |s| !s.loading).await;
        assert_eq!(state.points.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_first_snapshot_ends_loading() {
        let (store, _feed) = ScriptedStore::new(false);
        let sync = PointSync::new(store, Arc::new(ManualClock::new(at(1, 0))));

        let mut sub = sync.subscribe(&JourneyId::default());
        assert!(sync.state().loading);

        sub.cancel();
        assert!(!sync.state().loading);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let (store, _feed) = ScriptedStore::new(true);
        let sync = PointSync::new(store, Arc::new(ManualClock::new(at(1, 0))));

        let result = sync
            .add_point(&JourneyId::default(), draft("x", 51.0, 3.0, at(26, 8)))
            .await;

        assert_eq!(result, Err(SyncError::Store("Permission denied".to_string())));
        let state = sync.state();
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("Permission denied"));
    }
}
