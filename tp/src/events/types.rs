//! Event types for planning progress
//!
//! These events describe everything observable about one planning run:
//! - Run lifecycle (started, completed, failed)
//! - Phase transitions of the workflow state machine
//! - Fetch results per category, coordinator decisions, story progress
//! - Recovered warnings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Category, Money};
use crate::workflow::Phase;

/// Core event enum - the vocabulary of a planning run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlanEvent {
    // === Run Lifecycle ===
    /// A plan request passed validation and the workflow started
    PlanStarted {
        trip_id: String,
        destination: String,
        days: u32,
    },
    /// The plan finished and a result is available
    PlanCompleted {
        trip_id: String,
        total_cost: Money,
        within_budget: bool,
        best_effort: bool,
    },
    /// The plan failed with a categorized error
    PlanFailed {
        trip_id: String,
        category: String,
        message: String,
    },

    // === Workflow ===
    /// The workflow entered a new phase
    PhaseEntered {
        trip_id: String,
        phase: Phase,
        iteration: u32,
    },
    /// One fetch agent finished
    CategoryFetched {
        trip_id: String,
        category: Category,
        count: usize,
        cycle: u32,
    },
    /// The coordinator settled on a selection
    SelectionMade {
        trip_id: String,
        iteration: u32,
        total_cost: Money,
        fits: bool,
    },
    /// Narratives were produced for the selected activities
    StoriesReady { trip_id: String, count: usize },

    // === Warnings ===
    /// A node failed and was recovered
    Warning { trip_id: String, message: String },
}

impl PlanEvent {
    /// Get the trip ID for this event
    pub fn trip_id(&self) -> &str {
        match self {
            PlanEvent::PlanStarted { trip_id, .. }
            | PlanEvent::PlanCompleted { trip_id, .. }
            | PlanEvent::PlanFailed { trip_id, .. }
            | PlanEvent::PhaseEntered { trip_id, .. }
            | PlanEvent::CategoryFetched { trip_id, .. }
            | PlanEvent::SelectionMade { trip_id, .. }
            | PlanEvent::StoriesReady { trip_id, .. }
            | PlanEvent::Warning { trip_id, .. } => trip_id,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            PlanEvent::PlanStarted { .. } => "PlanStarted",
            PlanEvent::PlanCompleted { .. } => "PlanCompleted",
            PlanEvent::PlanFailed { .. } => "PlanFailed",
            PlanEvent::PhaseEntered { .. } => "PhaseEntered",
            PlanEvent::CategoryFetched { .. } => "CategoryFetched",
            PlanEvent::SelectionMade { .. } => "SelectionMade",
            PlanEvent::StoriesReady { .. } => "StoriesReady",
            PlanEvent::Warning { .. } => "Warning",
        }
    }

    /// Whether this event ends a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanEvent::PlanCompleted { .. } | PlanEvent::PlanFailed { .. })
    }
}

/// A timestamped event log entry for file persistence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub event: PlanEvent,
}

impl EventLogEntry {
    pub fn new(event: PlanEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
