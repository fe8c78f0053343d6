pub mod client;
pub mod parse;
pub mod provider;
pub mod types;

pub use client::{GatewayClient, GatewaySettings};
pub use parse::{parse_structured, strip_code_fence, summarize_raw};
pub use provider::{ImageGenerator, TextGenerator};
pub use types::{ChatMessage, CompletionRequest, GenerationError, Role};
