//! Narrative cache and result persistence
//!
//! Both are passed into the planner explicitly. Neither is required for a
//! plan to succeed: cache errors fall back to generation, and a failed save
//! is logged.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::TripResult;

mod memory;
mod sqlite;

pub use memory::{MemoryNarrativeCache, MemoryResultStore};
pub use sqlite::SqliteStore;

/// Errors from the cache or result store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Cache key for a narrative: place name plus location
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NarrativeKey {
    place: String,
    location: String,
}

impl NarrativeKey {
    /// Keys compare case-insensitively and ignore surrounding whitespace
    pub fn new(place: &str, location: &str) -> Self {
        Self {
            place: place.trim().to_lowercase(),
            location: location.trim().to_lowercase(),
        }
    }

    pub fn place(&self) -> &str {
        &self.place
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

/// Narrative cache keyed by (place name, location)
#[async_trait]
pub trait NarrativeCache: Send + Sync {
    async fn get(&self, key: &NarrativeKey) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: &NarrativeKey, text: &str) -> Result<(), StoreError>;

    /// Number of cached narratives
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Persistence for finished plans
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn save(&self, trip_id: Uuid, result: &TripResult) -> Result<(), StoreError>;

    async fn load(&self, trip_id: Uuid) -> Result<Option<TripResult>, StoreError>;
}
