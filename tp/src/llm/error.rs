//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Why a model call failed
///
/// Every variant ends up as a `ModelUnavailable` decision error; the split
/// only matters to the client's own retry loop.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Provider rate limit hit, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unusable model response: {0}")]
    Unusable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Whether another attempt may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } | LlmError::Network(_) => true,
            LlmError::Provider { status, .. } => *status >= 500,
            LlmError::Unusable(_) | LlmError::Config(_) => false,
        }
    }

    /// Provider-requested wait before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
