//! Cosmetic "what we're checking" step narration.

use std::sync::Arc;

use common::ResearchRequest;
use llm_client::{parse_structured, ChatMessage, CompletionRequest, GenerationError, TextGenerator};
use tracing::{instrument, warn};

use crate::prompts::steps_prompt;

pub const FALLBACK_STEPS: [&str; 4] = [
    "Gathering data...",
    "Analyzing context...",
    "Evaluating factors...",
    "Forming estimate...",
];

const MAX_STEPS: usize = 7;

pub fn fallback_steps() -> Vec<String> {
    FALLBACK_STEPS.iter().map(|s| s.to_string()).collect()
}

/// Steps for display. `fallback` marks the generic list returned when
/// the narration call failed; it is never worth caching.
#[derive(Debug, Clone, PartialEq)]
pub struct Narration {
    pub steps: Vec<String>,
    pub fallback: bool,
}

impl Narration {
    fn fallback() -> Self {
        Self { steps: fallback_steps(), fallback: true }
    }
}

pub struct StepNarrator {
    text: Arc<dyn TextGenerator>,
    model: String,
}

impl StepNarrator {
    pub fn new(text: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self { text, model: model.into() }
    }

    /// Never fails: any error yields [`FALLBACK_STEPS`].
    #[instrument(skip(self, request), fields(key = %request.key))]
    pub async fn narrate(&self, request: &ResearchRequest) -> Narration {
        match self.try_narrate(request).await {
            Ok(steps) if !steps.is_empty() => Narration { steps, fallback: false },
            Ok(_) => {
                warn!("Step narration was empty, using fallback");
                Narration::fallback()
            }
            Err(e) => {
                warn!("Step narration failed, using fallback: {}", e);
                Narration::fallback()
            }
        }
    }

    async fn try_narrate(&self, request: &ResearchRequest) -> Result<Vec<String>, GenerationError> {
        let completion = CompletionRequest::new(&self.model).message(ChatMessage::user(steps_prompt(request)));
        let text = self.text.complete(completion).await?;
        let steps: Vec<String> = parse_structured(&text)?;
        Ok(steps
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .take(MAX_STEPS)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedText;

    fn make_request() -> ResearchRequest {
        ResearchRequest::new("ALPHA", "Sinner vs Alcaraz Australian Open", "Sports")
    }

    #[tokio::test]
    async fn test_transport_error_yields_fallback() {
        let narrator = StepNarrator::new(
            Arc::new(ScriptedText::err(GenerationError::Transport("connection reset".into()))),
            "steps-model",
        );
        let narration = narrator.narrate(&make_request()).await;
        assert!(narration.fallback);
        assert_eq!(
            narration.steps,
            vec![
                "Gathering data...",
                "Analyzing context...",
                "Evaluating factors...",
                "Forming estimate...",
            ]
        );
    }

    #[tokio::test]
    async fn test_unparseable_or_empty_yields_fallback() {
        let narrator = StepNarrator::new(Arc::new(ScriptedText::ok("no idea")), "m");
        assert_eq!(narrator.narrate(&make_request()).await, Narration::fallback());

        let narrator = StepNarrator::new(Arc::new(ScriptedText::ok("[\"  \"]")), "m");
        assert_eq!(narrator.narrate(&make_request()).await, Narration::fallback());
    }

    #[tokio::test]
    async fn test_fenced_steps_are_trimmed_and_capped() {
        let reply = "```json\n[\" Sinner vs Alcaraz head-to-head \", \"b\", \"c\", \"d\", \"e\", \"f\", \"g\", \"h\"]\n```";
        let text = Arc::new(ScriptedText::ok(reply));
        let narrator = StepNarrator::new(text.clone(), "steps-model");

        let narration = narrator.narrate(&make_request()).await;

        assert!(!narration.fallback);
        let steps = narration.steps;
        assert_eq!(steps.len(), 7);
        assert_eq!(steps[0], "Sinner vs Alcaraz head-to-head");
        let seen = text.seen.lock().unwrap();
        assert_eq!(seen[0].model, "steps-model");
        assert!(seen[0].system.is_none());
    }
}
