//! LLM Client module for TripPlanner
//!
//! Provides LLM completion requests and client construction.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod openai;
mod types;

pub use client::LlmClient;
#[cfg(test)]
pub use client::mock;
pub use error::LlmError;
pub use openai::ChatCompletionsClient;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config
///
/// Supports "mistral" and "openai" providers.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model(), "create_client: called");
    match config.provider.as_str() {
        "mistral" | "openai" => Ok(Arc::new(ChatCompletionsClient::from_config(config)?)),
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::Config(format!(
                "Unknown LLM provider: '{}'. Supported: mistral, openai",
                other
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_rejected() {
        let config = LlmConfig {
            provider: "anthropic".to_string(),
            ..LlmConfig::default()
        };
        let err = create_client(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown LLM provider"));
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            api_key_env: Some("TP_TEST_KEY_THAT_IS_NOT_SET".to_string()),
            ..LlmConfig::default()
        };
        assert!(matches!(create_client(&config), Err(LlmError::Config(_))));
    }
}
