//! LlmDecider - structured decisions backed by an LLM client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::{DecisionError, DecisionPrompt, DecisionSchema, Decider, extract_json};
use crate::llm::{CompletionRequest, LlmClient, Message, StopReason};

/// Decider that asks the model for JSON and validates it
pub struct LlmDecider {
    client: Arc<dyn LlmClient>,
    timeout: Duration,
    max_tokens: u32,
}

impl LlmDecider {
    pub fn new(client: Arc<dyn LlmClient>, timeout: Duration, max_tokens: u32) -> Self {
        Self {
            client,
            timeout,
            max_tokens,
        }
    }
}

#[async_trait]
impl Decider for LlmDecider {
    async fn decide(&self, prompt: &DecisionPrompt, schema: &DecisionSchema) -> Result<Value, DecisionError> {
        debug!(schema = schema.name(), "LlmDecider::decide: called");
        let request = CompletionRequest {
            system_prompt: format!("{}\n\n{}", prompt.system, schema.instructions()),
            messages: vec![Message::user(prompt.user.clone())],
            max_tokens: self.max_tokens,
            temperature: prompt.temperature,
            json_mode: true,
        };

        let response = match tokio::time::timeout(self.timeout, self.client.complete(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(schema = schema.name(), error = %e, "LlmDecider::decide: model call failed");
                return Err(DecisionError::ModelUnavailable(e.to_string()));
            }
            Err(_) => {
                warn!(schema = schema.name(), timeout = ?self.timeout, "LlmDecider::decide: model call timed out");
                return Err(DecisionError::ModelUnavailable(format!("timed out after {:?}", self.timeout)));
            }
        };

        match response.stop_reason {
            StopReason::ContentFilter => {
                warn!(schema = schema.name(), "LlmDecider::decide: response blocked by content filter");
                return Err(DecisionError::ModelUnavailable("response blocked by content filter".to_string()));
            }
            StopReason::MaxTokens => debug!(schema = schema.name(), "LlmDecider::decide: response truncated"),
            StopReason::EndTurn => {}
        }

        let content = response
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| DecisionError::SchemaViolation(format!("{}: empty response", schema.name())))?;

        let value = extract_json(&content)
            .map_err(|e| DecisionError::SchemaViolation(format!("{}: {}", schema.name(), e)))?;
        schema.check(&value)?;
        Ok(value)
    }
}
