//! Prompt Template System
//!
//! Loads and renders `.hbs` prompt templates for the agents.
//!
//! Template loading chain:
//! 1. `{prompts.override-dir}/{name}.hbs` (user override)
//! 2. Embedded fallback in code
//!
//! Every role has a `{role}-system` and a `{role}` (user message) template.

mod context;
pub mod embedded;
mod loader;

pub use context::{CandidateLine, TripContext, lines};
pub use loader::{PromptLoader, RenderedPrompt};
