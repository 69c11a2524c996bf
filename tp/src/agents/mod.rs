//! Workflow agents
//!
//! Leaf agents (fetch, phrases, story) recover from their own failures and
//! report warnings. The coordinator and itinerary generator retry a model
//! failure once and then fail the run.

mod coordinator;
mod fetch;
mod itinerary;
mod phrases;
mod story;

pub use coordinator::{BudgetCoordinator, CoordinatorDecision, floor_selection, tighten_ceilings};
pub use fetch::{CURATION_WINDOW, Curator, FetchAgent, FetchOutcome, apply_ceiling};
pub use itinerary::ItineraryGenerator;
pub use phrases::{PhraseAgent, PhraseOutcome, fallback_phrasebook};
pub use story::{StoryAgent, StoryOutcome, clean_story};
