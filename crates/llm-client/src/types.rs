use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A text-generation call: optional system prompt plus the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages: Vec::new(),
        }
    }

    pub fn system(mut self, prompt: impl Into<String>) -> Self {
        self.system = Some(prompt.into());
        self
    }

    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        self.messages.extend(messages);
        self
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error("Generation service not configured: {0}")]
    Configuration(String),
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("Generation credits exhausted")]
    QuotaExhausted,
    #[error("Malformed generation output: {0}")]
    MalformedOutput(String),
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("HTTP status {status}: {body}")]
    Upstream { status: u16, body: String },
}

impl GenerationError {
    /// Stable code for journals and client error mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "RESEARCH_NOT_CONFIGURED",
            Self::RateLimited { .. } => "RESEARCH_RATE_LIMITED",
            Self::QuotaExhausted => "RESEARCH_QUOTA_EXHAUSTED",
            Self::MalformedOutput(_) => "RESEARCH_MALFORMED_OUTPUT",
            Self::Transport(_) => "RESEARCH_TRANSPORT_ERROR",
            Self::Upstream { .. } => "RESEARCH_HTTP_ERROR",
        }
    }

    /// Whether the caller may retry later without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transport(_))
    }
}
