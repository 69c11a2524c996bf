//! FixtureSource - offline search over JSON files
//!
//! Reads `{dir}/{category}.json` (for example `activity.json`). A missing
//! file means the provider has nothing for that category; an unreadable
//! or malformed file is reported as the source being unavailable.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::{SearchQuery, SourceError, SourceSearch, normalize_payload};
use crate::domain::Candidate;

pub struct FixtureSource {
    dir: PathBuf,
}

impl FixtureSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl SourceSearch for FixtureSource {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, SourceError> {
        let path = self.dir.join(format!("{}.json", query.category));
        debug!(?path, "FixtureSource::search: called");
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, "FixtureSource::search: no fixture file");
                return Ok(Vec::new());
            }
            Err(e) => return Err(SourceError::unavailable(query.category, e)),
        };
        let payload: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| SourceError::unavailable(query.category, format!("{}: {}", path.display(), e)))?;
        Ok(normalize_payload(&payload, query, "fixture"))
    }
}
