//! In-memory cache and result store

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{NarrativeCache, NarrativeKey, ResultStore, StoreError};
use crate::domain::TripResult;

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

#[derive(Default)]
pub struct MemoryNarrativeCache {
    entries: Mutex<HashMap<NarrativeKey, String>>,
}

impl MemoryNarrativeCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NarrativeCache for MemoryNarrativeCache {
    async fn get(&self, key: &NarrativeKey) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().map_err(poisoned)?.get(key).cloned())
    }

    async fn put(&self, key: &NarrativeKey, text: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .map_err(poisoned)?
            .insert(key.clone(), text.to_string());
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.entries.lock().map_err(poisoned)?.len())
    }
}

#[derive(Default)]
pub struct MemoryResultStore {
    results: Mutex<HashMap<Uuid, TripResult>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn save(&self, trip_id: Uuid, result: &TripResult) -> Result<(), StoreError> {
        self.results.lock().map_err(poisoned)?.insert(trip_id, result.clone());
        Ok(())
    }

    async fn load(&self, trip_id: Uuid) -> Result<Option<TripResult>, StoreError> {
        Ok(self.results.lock().map_err(poisoned)?.get(&trip_id).cloned())
    }
}
