//! Follow-up generation over an existing artifact: chat answers and
//! additional findings groups.

use std::collections::HashSet;
use std::sync::Arc;

use common::{ChatRole, ChatTurn, FindingsGroup, ResearchArtifact, ResearchRequest};
use llm_client::{parse_structured, ChatMessage, CompletionRequest, GenerationError, TextGenerator};
use serde::Deserialize;
use tracing::instrument;

use crate::prompts::{chat_system_prompt, extend_prompt};

const EMPTY_ANSWER: &str = "I'm not sure about that.";

pub struct ResearchChat {
    text: Arc<dyn TextGenerator>,
    model: String,
}

impl ResearchChat {
    pub fn new(text: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self { text, model: model.into() }
    }

    /// Answers `question` with the artifact as context; prior turns are
    /// replayed in order before it.
    #[instrument(skip_all, fields(key = %request.key, turns = prior_turns.len()))]
    pub async fn ask(
        &self,
        request: &ResearchRequest,
        artifact: &ResearchArtifact,
        prior_turns: &[ChatTurn],
        question: &str,
    ) -> Result<String, GenerationError> {
        let context = serde_json::to_string(artifact)
            .map_err(|e| GenerationError::Configuration(format!("artifact encoding failed: {}", e)))?;

        let history = prior_turns.iter().map(|turn| match turn.role {
            ChatRole::User => ChatMessage::user(&turn.content),
            ChatRole::Assistant => ChatMessage::assistant(&turn.content),
        });
        let completion = CompletionRequest::new(&self.model)
            .system(chat_system_prompt(request, &context))
            .messages(history)
            .message(ChatMessage::user(question));

        let answer = self.text.complete(completion).await?;
        let answer = answer.trim();
        Ok(if answer.is_empty() {
            EMPTY_ANSWER.to_string()
        } else {
            answer.to_string()
        })
    }
}

#[derive(Debug, Deserialize)]
struct MoreResearch {
    categories: Vec<FindingsGroup>,
}

pub struct ResearchExtender {
    text: Arc<dyn TextGenerator>,
    model: String,
}

impl ResearchExtender {
    pub fn new(text: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self { text, model: model.into() }
    }

    /// New groups whose titles differ (case-insensitively) from the ones shown.
    #[instrument(skip_all, fields(key = %request.key))]
    pub async fn extend(
        &self,
        request: &ResearchRequest,
        existing_titles: &[String],
    ) -> Result<Vec<FindingsGroup>, GenerationError> {
        let completion = CompletionRequest::new(&self.model)
            .message(ChatMessage::user(extend_prompt(request, existing_titles)));
        let text = self.text.complete(completion).await?;
        let more: MoreResearch = parse_structured(&text)?;

        let mut seen: HashSet<String> = existing_titles.iter().map(|t| t.trim().to_lowercase()).collect();
        Ok(more
            .categories
            .into_iter()
            .filter(|group| seen.insert(group.title.trim().to_lowercase()))
            .collect())
    }
}
