//! PhraseAgent - destination-language phrases

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::decision::{DecisionPrompt, DecisionSchema, Decider, FieldKind, decide_typed};
use crate::domain::{Phrase, Phrasebook, TripRequest};
use crate::prompts::PromptLoader;

#[derive(Serialize)]
struct PhrasesContext<'a> {
    destination: &'a str,
    country: &'a str,
}

fn phrasebook_schema() -> DecisionSchema {
    DecisionSchema::new(
        "phrasebook",
        json!({
            "language": "French",
            "phrases": [
                {"english": "Hello", "translation": "Bonjour", "phonetic": "bohn-ZHOOR"}
            ]
        }),
    )
    .require("language", FieldKind::String)
    .require("phrases", FieldKind::Array)
}

/// Phrasebook used when the model cannot produce one
pub fn fallback_phrasebook() -> Phrasebook {
    let phrase = |english: &str| Phrase {
        english: english.to_string(),
        translation: english.to_string(),
        phonetic: String::new(),
    };
    Phrasebook {
        language: "Unknown".to_string(),
        phrases: vec![phrase("Hello"), phrase("Thank you")],
    }
}

/// Outcome of the phrase agent; never an error
#[derive(Debug, Clone)]
pub struct PhraseOutcome {
    pub phrasebook: Phrasebook,
    pub warning: Option<String>,
}

#[derive(Clone)]
pub struct PhraseAgent {
    decider: Arc<dyn Decider>,
    prompts: Arc<PromptLoader>,
    temperature: f32,
}

impl PhraseAgent {
    pub fn new(decider: Arc<dyn Decider>, prompts: Arc<PromptLoader>, temperature: f32) -> Self {
        Self {
            decider,
            prompts,
            temperature,
        }
    }

    async fn generate(&self, request: &TripRequest) -> Result<Phrasebook, String> {
        let ctx = PhrasesContext {
            destination: &request.destination,
            country: request.country(),
        };
        let rendered = self.prompts.render_pair("phrases", &ctx).map_err(|e| e.to_string())?;
        let prompt = DecisionPrompt::new(rendered.system, rendered.user, self.temperature);
        let mut book: Phrasebook = decide_typed(self.decider.as_ref(), &prompt, &phrasebook_schema())
            .await
            .map_err(|e| e.to_string())?;
        book.phrases
            .retain(|p| !p.english.trim().is_empty() && !p.translation.trim().is_empty());
        if book.phrases.is_empty() {
            return Err("model returned no usable phrases".to_string());
        }
        Ok(book)
    }

    pub async fn run(&self, request: &TripRequest) -> PhraseOutcome {
        debug!(destination = %request.destination, "PhraseAgent::run: called");
        match self.generate(request).await {
            Ok(phrasebook) => PhraseOutcome {
                phrasebook,
                warning: None,
            },
            Err(reason) => {
                warn!(%reason, "PhraseAgent::run: using fallback phrasebook");
                PhraseOutcome {
                    phrasebook: fallback_phrasebook(),
                    warning: Some(format!("phrases unavailable: {}", reason)),
                }
            }
        }
    }
}
