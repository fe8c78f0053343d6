//! Seams for the text- and image-generation services.

use async_trait::async_trait;

use crate::types::{CompletionRequest, GenerationError};

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the raw text of the first completion choice.
    async fn complete(&self, request: CompletionRequest) -> Result<String, GenerationError>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns an image reference, or `None` when the service produced no image.
    async fn generate_image(&self, description: &str) -> Result<Option<String>, GenerationError>;
}
