use crate::parse::summarize_raw;
use crate::provider::{ImageGenerator, TextGenerator};
use crate::types::{ChatMessage, CompletionRequest, GenerationError, Role};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, instrument, warn};

const COMPLETIONS_PATH: &str = "/v1/chat/completions";
const DEFAULT_RETRY_AFTER_MS: u64 = 5_000;

/// Connection settings for an OpenAI-compatible completion gateway.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    /// `None` leaves the client unconfigured; every call then fails with
    /// `GenerationError::Configuration`.
    pub api_key: Option<String>,
    pub image_model: String,
    pub timeout_ms: u64,
    /// Retries for transport failures only.
    pub max_retries: u32,
}

pub struct GatewayClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    image_model: String,
    max_retries: u32,
}

impl GatewayClient {
    pub fn new(settings: GatewaySettings) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| GenerationError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.filter(|k| !k.trim().is_empty()),
            image_model: settings.image_model,
            max_retries: settings.max_retries,
        })
    }

    fn api_key(&self) -> Result<&str, GenerationError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| GenerationError::Configuration("AI gateway API key is not set".into()))
    }

    fn retry_after_ms(response: &reqwest::Response) -> u64 {
        response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs * 1_000)
            .unwrap_or(DEFAULT_RETRY_AFTER_MS)
    }

    async fn status_error(response: reqwest::Response) -> GenerationError {
        let status = response.status();
        match status {
            StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited {
                retry_after_ms: Self::retry_after_ms(&response),
            },
            StatusCode::PAYMENT_REQUIRED => GenerationError::QuotaExhausted,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                GenerationError::Configuration(format!("gateway rejected credentials ({})", status))
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                error!("AI gateway error: {} {}", status.as_u16(), summarize_raw(&body));
                GenerationError::Upstream {
                    status: status.as_u16(),
                    body: summarize_raw(&body),
                }
            }
        }
    }

    /// Posts a completion payload and returns the decoded envelope.
    async fn post(&self, payload: &Value) -> Result<Value, GenerationError> {
        let api_key = self.api_key()?;
        let url = format!("{}{}", self.base_url, COMPLETIONS_PATH);

        let mut attempt = 0u32;
        loop {
            let send_result = self
                .client
                .post(&url)
                .bearer_auth(api_key)
                .json(payload)
                .send()
                .await;

            match send_result {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Self::status_error(response).await);
                    }
                    return response.json::<Value>().await.map_err(|e| {
                        GenerationError::MalformedOutput(format!("invalid completion envelope: {}", e))
                    });
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        attempt += 1;
                        warn!("Gateway transport failure (attempt {}): {}", attempt, e);
                        sleep(Duration::from_millis(150 * u64::from(attempt))).await;
                        continue;
                    }
                    return Err(GenerationError::Transport(e.to_string()));
                }
            }
        }
    }

    fn wire_messages(request: &CompletionRequest) -> Vec<Value> {
        let system = request
            .system
            .as_ref()
            .map(|content| ChatMessage { role: Role::System, content: content.clone() });
        system
            .iter()
            .chain(request.messages.iter())
            .map(|m| json!({ "role": m.role, "content": m.content }))
            .collect()
    }

    fn extract_text(envelope: &Value) -> Result<String, GenerationError> {
        envelope
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| GenerationError::MalformedOutput("missing completion content".into()))
    }

    fn extract_image_url(envelope: &Value) -> Option<String> {
        envelope
            .pointer("/choices/0/message/images/0/image_url/url")
            .and_then(Value::as_str)
            .map(ToString::to_string)
    }
}

#[async_trait]
impl TextGenerator for GatewayClient {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<String, GenerationError> {
        let payload = json!({
            "model": request.model,
            "messages": Self::wire_messages(&request),
        });
        let envelope = self.post(&payload).await?;
        Self::extract_text(&envelope)
    }
}

#[async_trait]
impl ImageGenerator for GatewayClient {
    #[instrument(skip(self, description))]
    async fn generate_image(&self, description: &str) -> Result<Option<String>, GenerationError> {
        let payload = json!({
            "model": self.image_model,
            "messages": [{
                "role": "user",
                "content": format!(
                    "Generate a photorealistic image: {}. High quality, editorial style.",
                    description
                ),
            }],
            "modalities": ["image", "text"],
        });
        let envelope = self.post(&payload).await?;
        Ok(Self::extract_image_url(&envelope))
    }
}
