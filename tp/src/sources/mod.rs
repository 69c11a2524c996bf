//! Search sources for the fetch agents
//!
//! A [`SourceSearch`] answers one category query with normalized
//! candidates. "No results" is an empty list; only transport and auth
//! problems are errors.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use eyre::{Context, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::SourcesConfig;
use crate::domain::{Candidate, Category, Money, TripRequest};

mod fixture;
mod http;
mod normalize;

pub use fixture::FixtureSource;
pub use http::HttpSource;
pub use normalize::{normalize_payload, normalize_record};

/// Errors a source can report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("{category} source unavailable: {reason}")]
    Unavailable { category: Category, reason: String },
}

impl SourceError {
    pub fn unavailable(category: Category, reason: impl ToString) -> Self {
        SourceError::Unavailable {
            category,
            reason: reason.to_string(),
        }
    }
}

/// One category search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub category: Category,
    pub destination: String,
    pub origin: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub party_size: u32,
    pub nights: u32,
    pub preferences: Vec<String>,
    pub price_ceiling: Option<Money>,
}

impl SearchQuery {
    pub fn from_request(request: &TripRequest, category: Category, price_ceiling: Option<Money>) -> Self {
        Self {
            category,
            destination: request.destination.clone(),
            origin: request.origin.clone(),
            start_date: request.start_date,
            end_date: request.end_date,
            party_size: request.party.size(),
            nights: request.nights(),
            preferences: request.preferred_activities.clone(),
            price_ceiling,
        }
    }
}

/// Capability: search one category
#[async_trait]
pub trait SourceSearch: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, SourceError>;
}

/// One source per fetch agent
#[derive(Clone)]
pub struct Sources {
    pub transport: Arc<dyn SourceSearch>,
    pub accommodation: Arc<dyn SourceSearch>,
    pub activities: Arc<dyn SourceSearch>,
    pub dining: Arc<dyn SourceSearch>,
}

impl Sources {
    /// Use the same source for every category
    pub fn uniform(source: Arc<dyn SourceSearch>) -> Self {
        Self {
            transport: source.clone(),
            accommodation: source.clone(),
            activities: source.clone(),
            dining: source,
        }
    }

    pub fn get(&self, category: Category) -> &Arc<dyn SourceSearch> {
        match category {
            Category::Transport => &self.transport,
            Category::Accommodation => &self.accommodation,
            Category::Activity => &self.activities,
            Category::Dining => &self.dining,
        }
    }

    /// Build sources from configuration: fixtures when set, otherwise HTTP
    pub fn from_config(config: &SourcesConfig) -> Result<Self> {
        debug!(?config, "Sources::from_config: called");
        if let Some(dir) = &config.fixtures {
            let source = FixtureSource::new(dir.clone());
            return Ok(Self::uniform(Arc::new(source)));
        }
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| eyre::eyre!("sources.base-url or sources.fixtures must be set"))?;
        let api_key = std::env::var(&config.api_key_env).ok();
        let source = HttpSource::new(base_url, api_key).context("Failed to build HTTP source")?;
        Ok(Self::uniform(Arc::new(source)))
    }
}
