//! HttpSource - search over a JSON HTTP service
//!
//! `GET {base-url}/search/{category}` with the query as URL parameters.
//! The body is either a bare array of records or `{"results": [...]}`.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::{SearchQuery, SourceError, SourceSearch, normalize_payload};
use crate::domain::Candidate;

pub struct HttpSource {
    base_url: String,
    api_key: Option<String>,
    http: Client,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        let http = Client::builder().build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            http,
        })
    }

    fn params(query: &SearchQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("destination", query.destination.clone()),
            ("start_date", query.start_date.to_string()),
            ("end_date", query.end_date.to_string()),
            ("travelers", query.party_size.to_string()),
        ];
        if let Some(origin) = &query.origin {
            params.push(("origin", origin.clone()));
        }
        if !query.preferences.is_empty() {
            params.push(("preferences", query.preferences.join(",")));
        }
        if let Some(ceiling) = query.price_ceiling {
            params.push(("max_price", ceiling.to_string()));
        }
        params
    }
}

#[async_trait]
impl SourceSearch for HttpSource {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, SourceError> {
        let url = format!("{}/search/{}", self.base_url, query.category);
        debug!(%url, "HttpSource::search: called");

        let mut request = self.http.get(&url).query(&Self::params(query));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::unavailable(query.category, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(%url, "HttpSource::search: 404, treating as no results");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            warn!(%url, %status, "HttpSource::search: request failed");
            return Err(SourceError::unavailable(query.category, format!("HTTP {}", status)));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SourceError::unavailable(query.category, e))?;
        Ok(normalize_payload(&payload, query, &self.base_url))
    }
}
