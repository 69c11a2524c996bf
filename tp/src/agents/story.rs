//! StoryAgent - short narratives for the chosen activities
//!
//! Each activity is looked up in the narrative cache first. Cache errors are
//! logged and treated as a miss, as are lookups that exceed the story
//! timeout; nothing here can fail the run. A story that
//! times out is simply absent.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::Candidate;
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompts::PromptLoader;
use crate::store::{NarrativeCache, NarrativeKey};

const STORY_MAX_TOKENS: u32 = 300;

#[derive(Serialize)]
struct StoryContext<'a> {
    name: &'a str,
    kind: Option<&'a str>,
    description: Option<&'a str>,
    destination: &'a str,
}

/// Stories keyed by activity id plus any recovered failures
#[derive(Debug, Clone, Default)]
pub struct StoryOutcome {
    pub stories: BTreeMap<String, String>,
    pub warnings: Vec<String>,
}

/// Trim whitespace and wrapping quotes from a generated story
pub fn clean_story(text: &str) -> Option<String> {
    const QUOTES: &[char] = &['"', '\'', '\u{201c}', '\u{201d}'];
    let trimmed = text.trim();
    let unquoted = match (trimmed.chars().next(), trimmed.chars().last()) {
        (Some(first), Some(last)) if trimmed.len() > 1 && QUOTES.contains(&first) && QUOTES.contains(&last) => {
            trimmed.trim_matches(QUOTES).trim()
        }
        _ => trimmed,
    };
    (!unquoted.is_empty()).then(|| unquoted.to_string())
}

#[derive(Clone)]
pub struct StoryAgent {
    client: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    cache: Arc<dyn NarrativeCache>,
    timeout: Duration,
    temperature: f32,
}

impl StoryAgent {
    pub fn new(
        client: Arc<dyn LlmClient>,
        prompts: Arc<PromptLoader>,
        cache: Arc<dyn NarrativeCache>,
        timeout: Duration,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            prompts,
            cache,
            timeout,
            temperature,
        }
    }

    async fn generate(&self, activity: &Candidate, destination: &str) -> Result<String, String> {
        let ctx = StoryContext {
            name: &activity.name,
            kind: activity.tags.first().map(String::as_str),
            description: activity.description.as_deref(),
            destination,
        };
        let rendered = self.prompts.render_pair("story", &ctx).map_err(|e| e.to_string())?;
        let request = CompletionRequest {
            system_prompt: rendered.system,
            messages: vec![Message::user(rendered.user)],
            max_tokens: STORY_MAX_TOKENS,
            temperature: self.temperature,
            json_mode: false,
        };
        let response = tokio::time::timeout(self.timeout, self.client.complete(request))
            .await
            .map_err(|_| format!("timed out after {:?}", self.timeout))?
            .map_err(|e| e.to_string())?;
        response
            .content
            .as_deref()
            .and_then(clean_story)
            .ok_or_else(|| "empty story".to_string())
    }

    /// Narrative for one activity: cache hit, or generate and write back
    pub async fn narrate(&self, activity: &Candidate, destination: &str) -> Result<String, String> {
        let location = activity.location.as_deref().unwrap_or(destination);
        let key = NarrativeKey::new(&activity.name, location);
        debug!(id = %activity.id, place = key.place(), "StoryAgent::narrate: called");

        match tokio::time::timeout(self.timeout, self.cache.get(&key)).await {
            Ok(Ok(Some(text))) => {
                debug!(id = %activity.id, "StoryAgent::narrate: cache hit");
                return Ok(text);
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => warn!(id = %activity.id, error = %e, "StoryAgent::narrate: cache unavailable, generating"),
            Err(_) => warn!(id = %activity.id, timeout = ?self.timeout, "StoryAgent::narrate: cache lookup timed out, generating"),
        }

        let story = self.generate(activity, destination).await?;
        match tokio::time::timeout(self.timeout, self.cache.put(&key, &story)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(id = %activity.id, error = %e, "StoryAgent::narrate: cache write failed"),
            Err(_) => warn!(id = %activity.id, timeout = ?self.timeout, "StoryAgent::narrate: cache write timed out"),
        }
        Ok(story)
    }

    /// Narrate every activity concurrently
    pub async fn narrate_all(&self, activities: &[Candidate], destination: &str) -> StoryOutcome {
        debug!(count = activities.len(), "StoryAgent::narrate_all: called");
        let results = join_all(activities.iter().map(|a| async move { (a, self.narrate(a, destination).await) })).await;

        let mut outcome = StoryOutcome::default();
        for (activity, result) in results {
            match result {
                Ok(story) => {
                    outcome.stories.insert(activity.id.clone(), story);
                }
                Err(reason) => {
                    warn!(id = %activity.id, %reason, "StoryAgent::narrate_all: no story");
                    outcome.warnings.push(format!("no story for {}: {}", activity.name, reason));
                }
            }
        }
        info!(stories = outcome.stories.len(), "narratives ready");
        outcome
    }
}
