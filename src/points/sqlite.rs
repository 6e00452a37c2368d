//! SQLite-backed point store
//!
//! One `points` table keyed by (journey, id). Timestamps are stored as
//! milliseconds since the Unix epoch so ordering happens in the index.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::{StoreError, StoreResult};
use super::store::{JourneyFeeds, LiveQuery, PointStore};
use super::types::{new_point_id, Coordinates, JourneyId, NewPoint, Point, PointId, PointPatch};
use crate::clock::{Clock, SystemClock};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS points (
        journey TEXT NOT NULL,
        id TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        cover TEXT,
        timestamp INTEGER NOT NULL,
        url TEXT,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (journey, id)
    );
    CREATE INDEX IF NOT EXISTS idx_points_order ON points(journey, timestamp, created_at);
";

const SELECT_JOURNEY: &str = "
    SELECT id, title, latitude, longitude, cover, timestamp, url, created_at
    FROM points
    WHERE journey = ?
    ORDER BY timestamp, created_at, rowid
";

/// Durable point store on a single SQLite file
pub struct SqlitePointStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    feeds: JourneyFeeds,
    clock: Arc<dyn Clock>,
}

impl SqlitePointStore {
    /// Create or open a database file
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Database(e.to_string()))?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        let store = Self::from_connection(conn, Some(path.to_path_buf()))?;
        tracing::info!(path = %path.display(), "Opened point database");
        Ok(store)
    }

    /// Private database that disappears with the store
    pub fn in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    /// Stamp `created_at` from a different clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
            feeds: JourneyFeeds::new(),
            clock: Arc::new(SystemClock),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Database(format!("connection lock poisoned: {}", e)))
    }

    fn load(&self, journey: &JourneyId) -> StoreResult<Vec<Point>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(SELECT_JOURNEY)?;
        let rows = stmt.query_map(params![journey.as_str()], read_row)?;

        let mut points = Vec::new();
        for row in rows {
            points.push(row??);
        }
        Ok(points)
    }
}

/// Decode one row. The outer error is SQLite's, the inner one is ours.
fn read_row(row: &Row<'_>) -> rusqlite::Result<StoreResult<Point>> {
    let id: String = row.get(0)?;
    let timestamp: i64 = row.get(5)?;
    let created_at: i64 = row.get(7)?;

    let (Some(timestamp), Some(created_at)) = (from_millis(timestamp), from_millis(created_at))
    else {
        return Ok(Err(StoreError::Malformed(format!(
            "point {} has an out-of-range timestamp",
            id
        ))));
    };

    Ok(Ok(Point {
        id,
        title: row.get(1)?,
        coordinates: Coordinates::new(row.get(2)?, row.get(3)?),
        cover: row.get(4)?,
        timestamp,
        url: row.get(6)?,
        created_at,
    }))
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

#[async_trait]
impl PointStore for SqlitePointStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn list(&self, journey: &JourneyId) -> StoreResult<Vec<Point>> {
        self.load(journey)
    }

    async fn watch(&self, journey: &JourneyId) -> StoreResult<LiveQuery> {
        self.feeds.subscribe(journey, || self.load(journey))
    }

    async fn insert(&self, journey: &JourneyId, point: NewPoint) -> StoreResult<PointId> {
        point.validate()?;

        let id = new_point_id();
        let created_at = self.clock.now();
        {
            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO points (journey, id, title, latitude, longitude, cover, timestamp, url, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    journey.as_str(),
                    id,
                    point.title.unwrap_or_default(),
                    point.coordinates.latitude,
                    point.coordinates.longitude,
                    point.cover,
                    point.timestamp.timestamp_millis(),
                    point.url,
                    created_at.timestamp_millis(),
                ],
            )?;
        }

        tracing::debug!(journey = %journey, point_id = %id, "Inserted point");
        self.feeds.publish(journey, || self.load(journey))?;
        Ok(id)
    }

    async fn update(&self, journey: &JourneyId, id: &str, patch: PointPatch) -> StoreResult<()> {
        let changed = {
            let conn = self.lock()?;
            conn.execute(
                "UPDATE points SET title = ?, url = ?, timestamp = ?
                 WHERE journey = ? AND id = ?",
                params![
                    patch.title,
                    patch.url,
                    patch.timestamp.timestamp_millis(),
                    journey.as_str(),
                    id,
                ],
            )?
        };

        if changed == 0 {
            return Err(StoreError::NotFound {
                journey: journey.to_string(),
                id: id.to_string(),
            });
        }

        tracing::debug!(journey = %journey, point_id = %id, "Updated point");
        self.feeds.publish(journey, || self.load(journey))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use futures_util::StreamExt;
    use tempfile::TempDir;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, d, 10, 30, 0).unwrap()
    }

    fn gent() -> NewPoint {
        NewPoint::new(Coordinates::new(51.054, 3.717), day(29))
            .title("Gent")
            .url("https://visit.gent.be")
    }

    #[tokio::test]
    async fn test_points_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("points.db");
        let journey = JourneyId::default();

        let id = {
            let store = SqlitePointStore::open(&path).unwrap();
            store.insert(&journey, gent()).await.unwrap()
        };

        let store = SqlitePointStore::open(&path).unwrap();
        let points = store.list(&journey).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].id, id);
        assert_eq!(points[0].title, "Gent");
        assert_eq!(points[0].url.as_deref(), Some("https://visit.gent.be"));
        assert_eq!(points[0].timestamp, day(29));
        assert_eq!(points[0].cover, None);
    }

    #[tokio::test]
    async fn test_created_at_comes_from_clock() {
        let clock = Arc::new(ManualClock::new(day(1)));
        let store = SqlitePointStore::in_memory().unwrap().with_clock(clock);
        let journey = JourneyId::default();

        store.insert(&journey, gent()).await.unwrap();
        assert_eq!(store.list(&journey).await.unwrap()[0].created_at, day(1));
    }

    #[tokio::test]
    async fn test_list_orders_by_timestamp_then_creation() {
        let clock = Arc::new(ManualClock::new(day(1)));
        let store = SqlitePointStore::in_memory()
            .unwrap()
            .with_clock(clock.clone());
        let journey = JourneyId::default();

        for (title, d) in [("late", 28), ("tie-a", 27), ("early", 26), ("tie-b", 27)] {
            store
                .insert(&journey, NewPoint::new(Coordinates::new(51.0, 3.5), day(d)).title(title))
                .await
                .unwrap();
            clock.advance(chrono::Duration::seconds(1));
        }

        let titles: Vec<_> = store
            .list(&journey)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["early", "tie-a", "tie-b", "late"]);
    }

    #[tokio::test]
    async fn test_update_rewrites_editable_fields() {
        let store = SqlitePointStore::in_memory().unwrap();
        let journey = JourneyId::default();
        let id = store.insert(&journey, gent()).await.unwrap();

        store
            .update(
                &journey,
                &id,
                PointPatch {
                    title: String::new(),
                    url: String::new(),
                    timestamp: day(30),
                },
            )
            .await
            .unwrap();

        let point = &store.list(&journey).await.unwrap()[0];
        assert_eq!(point.title, "");
        assert_eq!(point.link(), None);
        assert_eq!(point.timestamp, day(30));
        assert_eq!(point.coordinates, Coordinates::new(51.054, 3.717));
    }

    #[tokio::test]
    async fn test_update_missing_point() {
        let store = SqlitePointStore::in_memory().unwrap();
        let result = store
            .update(
                &JourneyId::default(),
                "nope",
                PointPatch {
                    title: "x".into(),
                    url: String::new(),
                    timestamp: day(26),
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_invalid_point_is_not_written() {
        let store = SqlitePointStore::in_memory().unwrap();
        let journey = JourneyId::default();
        let result = store
            .insert(&journey, NewPoint::new(Coordinates::new(0.0, 200.0), day(26)))
            .await;

        assert!(matches!(result, Err(StoreError::InvalidData(_))));
        assert!(store.list(&journey).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_watch_sees_inserts() {
        let store = SqlitePointStore::in_memory().unwrap();
        let journey = JourneyId::default();

        let mut live = store.watch(&journey).await.unwrap();
        assert!(live.next().await.unwrap().unwrap().is_empty());

        store.insert(&journey, gent()).await.unwrap();
        let snapshot = live.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].title, "Gent");
    }
}
