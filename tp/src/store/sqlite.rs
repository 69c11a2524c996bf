//! SQLite-backed cache and result store
//!
//! One database file holds both tables. Calls run on the blocking pool so
//! the async workflow never waits on disk I/O directly.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};
use uuid::Uuid;

use super::{NarrativeCache, NarrativeKey, ResultStore, StoreError};
use crate::domain::TripResult;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS narratives (
    place TEXT NOT NULL,
    location TEXT NOT NULL,
    story TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (place, location)
);
CREATE TABLE IF NOT EXISTS trip_results (
    trip_id TEXT PRIMARY KEY,
    destination TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
";

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        debug!(?path, "SqliteStore::open: called");
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("{}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory database, used by tests and one-off runs
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        info!("SQLite store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
    }
}

#[async_trait]
impl NarrativeCache for SqliteStore {
    async fn get(&self, key: &NarrativeKey) -> Result<Option<String>, StoreError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            let story = conn
                .query_row(
                    "SELECT story FROM narratives WHERE place = ?1 AND location = ?2",
                    params![key.place(), key.location()],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(story)
        })
        .await
    }

    async fn put(&self, key: &NarrativeKey, text: &str) -> Result<(), StoreError> {
        let key = key.clone();
        let text = text.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO narratives (place, location, story) VALUES (?1, ?2, ?3)
                 ON CONFLICT(place, location) DO UPDATE SET story = excluded.story",
                params![key.place(), key.location(), text],
            )?;
            Ok(())
        })
        .await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM narratives", [], |row| row.get(0))?;
            Ok(n as usize)
        })
        .await
    }
}

#[async_trait]
impl ResultStore for SqliteStore {
    async fn save(&self, trip_id: Uuid, result: &TripResult) -> Result<(), StoreError> {
        debug!(%trip_id, "SqliteStore::save: called");
        let payload = serde_json::to_string(result)?;
        let destination = result.destination.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO trip_results (trip_id, destination, payload) VALUES (?1, ?2, ?3)",
                params![trip_id.to_string(), destination, payload],
            )?;
            Ok(())
        })
        .await
    }

    async fn load(&self, trip_id: Uuid) -> Result<Option<TripResult>, StoreError> {
        debug!(%trip_id, "SqliteStore::load: called");
        let payload = self
            .with_conn(move |conn| {
                let payload = conn
                    .query_row(
                        "SELECT payload FROM trip_results WHERE trip_id = ?1",
                        params![trip_id.to_string()],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?;
                Ok(payload)
            })
            .await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(StoreError::from))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::fixtures::paris_request;
    use crate::domain::{Candidate, Category, Itinerary, Money, Selection, TripState};

    fn sample_result() -> TripResult {
        let mut state = TripState::new(paris_request(3000.0, 3), 2);
        state.apply_selection(Selection {
            transport: Some(Candidate::new("f1", Category::Transport, "Air Test", Money::from_major(800.0))),
            ..Selection::default()
        });
        state
            .set_final_itinerary(Itinerary {
                days: vec![],
                tips: vec![],
            })
            .unwrap();
        TripResult::from_state(Uuid::now_v7(), &state).unwrap()
    }

    #[tokio::test]
    async fn test_narrative_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tp.db");
        let key = NarrativeKey::new("Louvre", "Paris, France");

        {
            let store = SqliteStore::open(&path).unwrap();
            assert_eq!(store.get(&key).await.unwrap(), None);
            store.put(&key, "first").await.unwrap();
            store.put(&key, "second").await.unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.get(&key).await.unwrap().as_deref(), Some("second"));
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_result_save_and_load() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = sample_result();
        store.save(result.trip_id, &result).await.unwrap();

        let loaded = store.load(result.trip_id).await.unwrap().unwrap();
        assert_eq!(loaded.trip_id, result.trip_id);
        assert_eq!(loaded.budget.total_cost, Money::from_major(800.0));
        assert!(store.load(Uuid::now_v7()).await.unwrap().is_none());
    }
}
