//! FetchAgent - one category search, filtered, ranked and bounded
//!
//! A fetch never fails the run. Timeouts and unavailable sources produce an
//! empty list plus a warning; the coordinator works with whatever the other
//! categories returned.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::decision::{DecisionPrompt, DecisionSchema, Decider, FieldKind, decide_typed};
use crate::domain::{Candidate, Category, Money, TripRequest, price_order, sort_ranked};
use crate::prompts::{CandidateLine, PromptLoader, TripContext, lines};
use crate::sources::{SearchQuery, SourceSearch};

/// Most candidates offered to the model for curation
pub const CURATION_WINDOW: usize = 30;

/// Result of one fetch
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub candidates: Vec<Candidate>,
    pub warning: Option<String>,
}

/// Model-backed curation of a ranked list
#[derive(Clone)]
pub struct Curator {
    decider: Arc<dyn Decider>,
    prompts: Arc<PromptLoader>,
    temperature: f32,
}

#[derive(Serialize)]
struct CurateContext<'a> {
    trip: TripContext,
    category: &'a str,
    limit: usize,
    shown: usize,
    total: usize,
    candidates: Vec<CandidateLine>,
}

#[derive(Deserialize)]
struct Curation {
    selected_ids: Vec<String>,
}

fn curation_schema() -> DecisionSchema {
    DecisionSchema::new("curation", json!({"selected_ids": ["id_1", "id_2"]}))
        .require("selected_ids", FieldKind::Array)
}

impl Curator {
    pub fn new(decider: Arc<dyn Decider>, prompts: Arc<PromptLoader>, temperature: f32) -> Self {
        Self {
            decider,
            prompts,
            temperature,
        }
    }

    /// Pick `limit` candidates from an already ranked list
    ///
    /// Model picks keep ranked order and are topped up from the ranked
    /// remainder. Errors leave the caller to fall back to plain ranking.
    pub async fn curate(
        &self,
        request: &TripRequest,
        category: Category,
        ranked: &[Candidate],
        limit: usize,
    ) -> Result<Vec<Candidate>, String> {
        debug!(%category, total = ranked.len(), limit, "Curator::curate: called");
        let offered = &ranked[..ranked.len().min(CURATION_WINDOW)];
        let ctx = CurateContext {
            trip: TripContext::from(request),
            category: category.as_str(),
            limit,
            shown: offered.len(),
            total: ranked.len(),
            candidates: lines(offered),
        };
        let rendered = self.prompts.render_pair("curate", &ctx).map_err(|e| e.to_string())?;
        let prompt = DecisionPrompt::new(rendered.system, rendered.user, self.temperature);
        let curation: Curation = decide_typed(self.decider.as_ref(), &prompt, &curation_schema())
            .await
            .map_err(|e| e.to_string())?;

        let picked: HashSet<&str> = curation.selected_ids.iter().map(String::as_str).collect();
        let mut chosen: Vec<Candidate> = offered
            .iter()
            .filter(|c| picked.contains(c.id.as_str()))
            .take(limit)
            .cloned()
            .collect();
        if chosen.is_empty() {
            return Err("model selected no known ids".to_string());
        }
        for candidate in ranked {
            if chosen.len() >= limit {
                break;
            }
            if !chosen.iter().any(|c| c.id == candidate.id) {
                chosen.push(candidate.clone());
            }
        }
        debug!(%category, picked = picked.len(), kept = chosen.len(), "Curator::curate: done");
        Ok(chosen)
    }
}

/// Keep candidates priced at or under `ceiling`
///
/// If nothing qualifies the single cheapest candidate is kept, so a
/// ceiling never empties a category that had results.
pub fn apply_ceiling(candidates: Vec<Candidate>, ceiling: Option<Money>) -> Vec<Candidate> {
    let Some(ceiling) = ceiling else {
        return candidates;
    };
    let cheapest = candidates.iter().min_by(|a, b| price_order(a, b)).cloned();
    let kept: Vec<Candidate> = candidates.into_iter().filter(|c| c.price <= ceiling).collect();
    if kept.is_empty() {
        return cheapest.into_iter().collect();
    }
    kept
}

/// Fetch agent for one category
#[derive(Clone)]
pub struct FetchAgent {
    category: Category,
    source: Arc<dyn SourceSearch>,
    curator: Option<Curator>,
    limit: usize,
    timeout: Duration,
}

impl FetchAgent {
    pub fn new(category: Category, source: Arc<dyn SourceSearch>, limit: usize, timeout: Duration) -> Self {
        Self {
            category,
            source,
            curator: None,
            limit,
            timeout,
        }
    }

    pub fn with_curator(mut self, curator: Curator) -> Self {
        self.curator = Some(curator);
        self
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub async fn run(&self, request: &TripRequest, ceiling: Option<Money>) -> FetchOutcome {
        let category = self.category;
        debug!(%category, ?ceiling, "FetchAgent::run: called");
        let query = SearchQuery::from_request(request, category, ceiling);

        let found = match tokio::time::timeout(self.timeout, self.source.search(&query)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!(%category, error = %e, "FetchAgent::run: source failed");
                return FetchOutcome {
                    candidates: Vec::new(),
                    warning: Some(e.to_string()),
                };
            }
            Err(_) => {
                warn!(%category, timeout = ?self.timeout, "FetchAgent::run: search timed out");
                return FetchOutcome {
                    candidates: Vec::new(),
                    warning: Some(format!("{} search timed out after {:?}", category, self.timeout)),
                };
            }
        };

        let mut seen = HashSet::new();
        let unique: Vec<Candidate> = found
            .into_iter()
            .filter(|c| c.category == category && seen.insert(c.id.clone()))
            .collect();
        let mut ranked = apply_ceiling(unique, ceiling);
        sort_ranked(&mut ranked, category, &request.preferred_activities);

        let mut warning = None;
        let candidates = match &self.curator {
            Some(curator) if ranked.len() > self.limit => {
                match curator.curate(request, category, &ranked, self.limit).await {
                    Ok(curated) => curated,
                    Err(reason) => {
                        warn!(%category, %reason, "FetchAgent::run: curation failed, using ranking");
                        warning = Some(format!("{} curation skipped: {}", category, reason));
                        ranked.truncate(self.limit);
                        ranked
                    }
                }
            }
            _ => {
                ranked.truncate(self.limit);
                ranked
            }
        };

        info!(%category, count = candidates.len(), "fetched candidates");
        FetchOutcome { candidates, warning }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DecisionError;
    use crate::decision::mock::ScriptedDecider;
    use crate::domain::request::fixtures::paris_request;
    use crate::sources::mock::StaticSource;

    fn activity(id: &str, price: f64, rating: f64) -> Candidate {
        Candidate::new(id, Category::Activity, id, Money::from_major(price)).with_rating(rating)
    }

    fn agent(source: StaticSource, limit: usize) -> FetchAgent {
        FetchAgent::new(Category::Activity, Arc::new(source), limit, Duration::from_millis(200))
    }

    fn many(n: usize) -> Vec<Candidate> {
        (0..n).map(|i| activity(&format!("a{:02}", i), 10.0 + i as f64, 4.0)).collect()
    }

    #[test]
    fn test_ceiling_keeps_cheapest_when_nothing_fits() {
        let list = vec![activity("a", 50.0, 4.0), activity("b", 40.0, 3.0)];
        let kept = apply_ceiling(list.clone(), Some(Money::from_major(45.0)));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "b");

        let kept = apply_ceiling(list.clone(), Some(Money::from_major(10.0)));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "b");

        assert_eq!(apply_ceiling(list, None).len(), 2);
        assert!(apply_ceiling(Vec::new(), Some(Money::ZERO)).is_empty());
    }

    #[tokio::test]
    async fn test_bounded_and_ranked() {
        let outcome = agent(StaticSource::new(many(15)), 10)
            .run(&paris_request(3000.0, 5), None)
            .await;
        assert_eq!(outcome.candidates.len(), 10);
        assert_eq!(outcome.candidates[0].id, "a00");
        assert!(outcome.warning.is_none());
    }

    #[tokio::test]
    async fn test_failure_and_timeout_are_empty() {
        let request = paris_request(3000.0, 5);
        let outcome = agent(StaticSource::failing(), 10).run(&request, None).await;
        assert!(outcome.candidates.is_empty());
        assert!(outcome.warning.is_some());

        let slow = StaticSource::slow(many(3), Duration::from_secs(5));
        let outcome = agent(slow, 10).run(&request, None).await;
        assert!(outcome.candidates.is_empty());
        assert!(outcome.warning.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_curation_picks_then_backfills() {
        let decider = ScriptedDecider::new().reply("curation", Ok(json!({"selected_ids": ["a07", "a03", "zzz"]})));
        let curator = Curator::new(Arc::new(decider), Arc::new(PromptLoader::embedded_only()), 0.3);
        let outcome = agent(StaticSource::new(many(12)), 4)
            .with_curator(curator)
            .run(&paris_request(3000.0, 5), None)
            .await;
        let ids: Vec<_> = outcome.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a03", "a07", "a00", "a01"]);
    }

    #[tokio::test]
    async fn test_curation_failure_falls_back_to_ranking() {
        let decider = ScriptedDecider::new().reply("curation", Err(DecisionError::ModelUnavailable("down".into())));
        let curator = Curator::new(Arc::new(decider), Arc::new(PromptLoader::embedded_only()), 0.3);
        let outcome = agent(StaticSource::new(many(12)), 4)
            .with_curator(curator)
            .run(&paris_request(3000.0, 5), None)
            .await;
        assert_eq!(outcome.candidates.len(), 4);
        assert_eq!(outcome.candidates[0].id, "a00");
        assert!(outcome.warning.unwrap().contains("curation"));
    }

    #[tokio::test]
    async fn test_other_categories_and_duplicates_dropped() {
        let mut list = many(2);
        list.push(activity("a00", 99.0, 5.0));
        list.push(Candidate::new("d1", Category::Dining, "Bistro", Money::from_major(20.0)));
        let outcome = agent(StaticSource::new(list), 10).run(&paris_request(3000.0, 5), None).await;
        let ids: Vec<_> = outcome.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a00", "a01"]);
    }
}
