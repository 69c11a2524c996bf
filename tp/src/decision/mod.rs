//! Structured model decisions
//!
//! Agents never talk to the LLM client directly when they need a
//! machine-readable answer. They hand a [`DecisionPrompt`] and a
//! [`DecisionSchema`] to a [`Decider`] and get back JSON that is known to
//! carry the required fields.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

mod extract;
mod llm;
mod schema;

pub use extract::extract_json;
pub use llm::LlmDecider;
pub use schema::{DecisionSchema, FieldKind};

/// Why a decision could not be made
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Schema violation: {0}")]
    SchemaViolation(String),
}

/// Prompt for one decision
#[derive(Debug, Clone)]
pub struct DecisionPrompt {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

impl DecisionPrompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature,
        }
    }
}

/// Capability: produce structured output for a prompt and schema
#[async_trait]
pub trait Decider: Send + Sync {
    async fn decide(&self, prompt: &DecisionPrompt, schema: &DecisionSchema) -> Result<Value, DecisionError>;
}

/// Decide and deserialize into `T`
pub async fn decide_typed<T: DeserializeOwned>(
    decider: &dyn Decider,
    prompt: &DecisionPrompt,
    schema: &DecisionSchema,
) -> Result<T, DecisionError> {
    let value = decider.decide(prompt, schema).await?;
    serde_json::from_value(value)
        .map_err(|e| DecisionError::SchemaViolation(format!("{}: {}", schema.name(), e)))
}

/// Decide with one retry on the same input
pub async fn decide_with_retry<T: DeserializeOwned>(
    decider: &dyn Decider,
    prompt: &DecisionPrompt,
    schema: &DecisionSchema,
) -> Result<T, DecisionError> {
    debug!(schema = schema.name(), "decide_with_retry: called");
    match decide_typed(decider, prompt, schema).await {
        Ok(value) => Ok(value),
        Err(first) => {
            warn!(schema = schema.name(), error = %first, "decide_with_retry: first attempt failed, retrying");
            decide_typed(decider, prompt, schema).await
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::ScriptedDecider;
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pick {
        id: String,
    }

    fn schema() -> DecisionSchema {
        DecisionSchema::new("pick", json!({"id": "x"})).require("id", FieldKind::String)
    }

    fn prompt() -> DecisionPrompt {
        DecisionPrompt::new("system", "user", 0.3)
    }

    #[tokio::test]
    async fn test_retry_recovers_after_one_failure() {
        let decider = ScriptedDecider::new()
            .reply("pick", Err(DecisionError::ModelUnavailable("down".into())))
            .reply("pick", Ok(json!({"id": "a1"})));
        let pick: Pick = decide_with_retry(&decider, &prompt(), &schema()).await.unwrap();
        assert_eq!(pick.id, "a1");
        assert_eq!(decider.calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_second_failure() {
        let decider = ScriptedDecider::new().reply("pick", Ok(json!({"name": "no id"})));
        let result: Result<Pick, _> = decide_with_retry(&decider, &prompt(), &schema()).await;
        assert!(matches!(result, Err(DecisionError::SchemaViolation(_))));
        assert_eq!(decider.calls(), 2);
    }

    #[tokio::test]
    async fn test_typed_mismatch_is_schema_violation() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Numbered {
            id: u32,
        }
        let decider = ScriptedDecider::new().reply("pick", Ok(json!({"id": "not a number"})));
        let result: Result<Numbered, _> = decide_typed(&decider, &prompt(), &schema()).await;
        assert!(matches!(result, Err(DecisionError::SchemaViolation(_))));
    }
}
