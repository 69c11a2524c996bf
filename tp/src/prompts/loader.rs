//! Prompt Loader
//!
//! Loads prompt templates from the override directory or falls back to
//! embedded defaults.

use std::path::PathBuf;

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// A rendered system/user prompt pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `~/.config/tripplanner/prompts/`)
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `override_dir` before the embedded templates
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        debug!(?override_dir, "PromptLoader::new: called");
        let override_dir = override_dir.filter(|dir| {
            let exists = dir.is_dir();
            if !exists {
                debug!(?dir, "PromptLoader::new: override directory missing, ignoring");
            }
            exists
        });
        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);
        Self { hbs, override_dir }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        Self::new(None)
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. Override: `{override_dir}/{name}.hbs`
    /// 2. Embedded fallback
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.hbs", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in override directory");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt override {}: {}", path.display(), e));
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render<T: Serialize>(&self, template_name: &str, context: &T) -> Result<String> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    /// Render `{role}-system` and `{role}` with one context
    pub fn render_pair<T: Serialize>(&self, role: &str, context: &T) -> Result<RenderedPrompt> {
        Ok(RenderedPrompt {
            system: self.render(&format!("{}-system", role), context)?,
            user: self.render(role, context)?,
        })
    }
}

impl Default for PromptLoader {
    fn default() -> Self {
        Self::embedded_only()
    }
}
