use async_trait::async_trait;
use llm_client::{CompletionRequest, GenerationError, TextGenerator};
use std::sync::Mutex;

/// Replies with a fixed result and records every request it sees.
pub struct ScriptedText {
    reply: Result<String, GenerationError>,
    pub seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedText {
    pub fn ok(text: &str) -> Self {
        Self { reply: Ok(text.to_string()), seen: Mutex::new(Vec::new()) }
    }

    pub fn err(error: GenerationError) -> Self {
        Self { reply: Err(error), seen: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GenerationError> {
        self.seen.lock().unwrap().push(request);
        self.reply.clone()
    }
}
