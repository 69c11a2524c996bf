//! Embedded prompts
//!
//! These are compiled into the binary from .hbs files at build time.

use tracing::debug;

pub const CURATE_SYSTEM: &str = include_str!("../../prompts/curate-system.hbs");
pub const CURATE: &str = include_str!("../../prompts/curate.hbs");
pub const COORDINATE_SYSTEM: &str = include_str!("../../prompts/coordinate-system.hbs");
pub const COORDINATE: &str = include_str!("../../prompts/coordinate.hbs");
pub const ITINERARY_SYSTEM: &str = include_str!("../../prompts/itinerary-system.hbs");
pub const ITINERARY: &str = include_str!("../../prompts/itinerary.hbs");
pub const STORY_SYSTEM: &str = include_str!("../../prompts/story-system.hbs");
pub const STORY: &str = include_str!("../../prompts/story.hbs");
pub const PHRASES_SYSTEM: &str = include_str!("../../prompts/phrases-system.hbs");
pub const PHRASES: &str = include_str!("../../prompts/phrases.hbs");

/// Names of every embedded template
pub const NAMES: &[&str] = &[
    "curate-system",
    "curate",
    "coordinate-system",
    "coordinate",
    "itinerary-system",
    "itinerary",
    "story-system",
    "story",
    "phrases-system",
    "phrases",
];

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    let template = match name {
        "curate-system" => CURATE_SYSTEM,
        "curate" => CURATE,
        "coordinate-system" => COORDINATE_SYSTEM,
        "coordinate" => COORDINATE,
        "itinerary-system" => ITINERARY_SYSTEM,
        "itinerary" => ITINERARY,
        "story-system" => STORY_SYSTEM,
        "story" => STORY,
        "phrases-system" => PHRASES_SYSTEM,
        "phrases" => PHRASES,
        _ => {
            debug!("get_embedded: no match found");
            return None;
        }
    };
    Some(template)
}
