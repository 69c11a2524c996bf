//! Workflow phases and the transitions allowed between them

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PlanningError;

/// Where a planning run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Fetching,
    Coordinating,
    AdjustingRetry,
    StoryGenerating,
    Composing,
    Done,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }

    /// Whether the machine may move from `self` to `next`
    ///
    /// Every non-terminal phase may fail. Adjustment always loops back to
    /// fetching; the iteration cap is checked by the caller before entering it.
    pub fn can_transition_to(&self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Fetching, Coordinating) => true,
            (Coordinating, AdjustingRetry | StoryGenerating) => true,
            (AdjustingRetry, Fetching) => true,
            (StoryGenerating, Composing) => true,
            (Composing, Done) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Fetching => "fetching",
            Phase::Coordinating => "coordinating",
            Phase::AdjustingRetry => "adjusting-retry",
            Phase::StoryGenerating => "story-generating",
            Phase::Composing => "composing",
            Phase::Done => "done",
            Phase::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks the current phase and rejects illegal moves
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    current: Phase,
    history: Vec<Phase>,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self {
            current: Phase::Fetching,
            history: vec![Phase::Fetching],
        }
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn advance(&mut self, next: Phase) -> Result<(), PlanningError> {
        if !self.current.can_transition_to(next) {
            return Err(PlanningError::Internal(format!(
                "illegal phase transition {} -> {}",
                self.current, next
            )));
        }
        self.current = next;
        self.history.push(next);
        Ok(())
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}
