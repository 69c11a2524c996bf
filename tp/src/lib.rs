//! TripPlanner - multi-agent trip planning with bounded budget adjustment
//!
//! A trip request fans out to four fetch agents (transport, accommodation,
//! activities, dining) and a phrase agent. A budget coordinator picks a
//! selection; when it does not fit, price ceilings are tightened and the
//! fetch agents run again, up to a fixed number of iterations. Stories are
//! then generated for the chosen activities and an itinerary is composed.
//!
//! # Modules
//!
//! - [`domain`] - Requests, candidates, costs and the assembled result
//! - [`sources`] - Search providers behind the fetch agents
//! - [`decision`] - Structured model decisions with schema checks
//! - [`agents`] - Fetch, coordinator, story, phrase and itinerary agents
//! - [`workflow`] - Phase machine, controller and the top-level planner
//! - [`store`] - Narrative cache and result persistence
//! - [`events`] - Progress events and their JSONL history
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod agents;
pub mod cli;
pub mod config;
pub mod decision;
pub mod domain;
pub mod error;
pub mod events;
pub mod llm;
pub mod prompts;
pub mod sources;
pub mod store;
pub mod workflow;

// Re-export commonly used types
pub use config::{Config, LlmConfig, WorkflowConfig};
pub use decision::{Decider, DecisionError, DecisionPrompt, DecisionSchema, LlmDecider};
pub use domain::{
    Candidate, CandidatePools, Category, DayPlan, Itinerary, Money, Selection, TripRequest, TripResult, TripState,
};
pub use error::PlanningError;
pub use events::{EventBus, EventEmitter, EventLogEntry, EventLogger, PlanEvent, create_event_bus, spawn_event_logger};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, create_client};
pub use prompts::PromptLoader;
pub use sources::{FixtureSource, HttpSource, SearchQuery, SourceError, SourceSearch, Sources};
pub use store::{MemoryNarrativeCache, MemoryResultStore, NarrativeCache, NarrativeKey, ResultStore, SqliteStore};
pub use workflow::{Phase, Planner, Services, WorkflowController};
