//! Fatal planning errors
//!
//! Only these surface to the caller. Node-local failures (a source being
//! down, the narrative cache being unreachable, a story timing out) are
//! recovered inside the workflow and never become a `PlanningError`.

use thiserror::Error;

/// A plan request that could not be completed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningError {
    #[error("Invalid trip request: {0}")]
    InvalidRequest(String),

    #[error("No data available for this destination: {destination}")]
    NoData { destination: String },

    #[error("Planning service unavailable during {stage}: {reason}")]
    ServiceUnavailable { stage: String, reason: String },

    #[error("Workflow invariant violated: {0}")]
    Internal(String),
}

impl PlanningError {
    /// Stable category string for the single user-visible error
    pub fn category(&self) -> &'static str {
        match self {
            PlanningError::InvalidRequest(_) => "invalid_request",
            PlanningError::NoData { .. } => "no_data",
            PlanningError::ServiceUnavailable { .. } => "service_unavailable",
            PlanningError::Internal(_) => "internal",
        }
    }

    pub fn service_unavailable(stage: impl Into<String>, reason: impl ToString) -> Self {
        PlanningError::ServiceUnavailable {
            stage: stage.into(),
            reason: reason.to_string(),
        }
    }
}
