//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, and any endpoint exposing
//! `/chat/completions`.
//!
//! Supports:
//! - Non-streaming completions (used for summarizing ingested content)
//! - Streaming completions relayed as raw bytes (used for chat)

use async_trait::async_trait;
use futures::TryStreamExt;
use secondbrain_core::error::ProviderError;
use secondbrain_core::message::ConversationTurn;
use secondbrain_core::provider::{ByteStream, Provider, ProviderRequest, ProviderResponse};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        // Only the connect phase is bounded; a chat stream may legitimately
        // stay open for minutes.
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Turns with images become a list of content parts, text first.
    fn to_api_messages(messages: &[ConversationTurn]) -> Vec<ApiMessage<'_>> {
        messages
            .iter()
            .map(|m| {
                let content = if m.images.is_empty() {
                    ApiContent::Text(&m.content)
                } else {
                    let mut parts = vec![ApiContentPart::Text { text: &m.content }];
                    parts.extend(m.images.iter().map(|url| ApiContentPart::ImageUrl {
                        image_url: ApiImageUrl { url: url.as_str() },
                    }));
                    ApiContent::Parts(parts)
                };
                ApiMessage {
                    role: m.role,
                    content,
                }
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": request.stream,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }

    async fn send(&self, body: &serde_json::Value, stream: bool) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body);
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        check_status(response).await
    }
}

/// Map non-success statuses onto the provider error taxonomy.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        warn!(status, ?retry_after_secs, "Provider rate limited the request");
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    let error_body = response.text().await.unwrap_or_default();
    warn!(status, body = %error_body, "Provider returned error");

    if status == 402 {
        return Err(ProviderError::PaymentRequired(error_body));
    }

    Err(ProviderError::ApiError {
        status_code: status,
        message: error_body,
    })
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = Self::request_body(&request);
        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self.send(&body, false).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        Ok(ProviderResponse {
            content: choice.message.content.unwrap_or_default(),
            model: api_response.model.unwrap_or(request.model),
        })
    }

    async fn stream_bytes(&self, request: ProviderRequest) -> Result<ByteStream, ProviderError> {
        let body = Self::request_body(&request);
        debug!(
            provider = %self.name,
            model = %request.model,
            turns = request.messages.len(),
            stream = request.stream,
            "Sending streaming request"
        );

        let response = self.send(&body, request.stream).await?;

        let stream = response
            .bytes_stream()
            .map_err(|e| ProviderError::StreamInterrupted(e.to_string()));
        Ok(Box::pin(stream))
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: secondbrain_core::Role,
    content: ApiContent<'a>,
}

/// A plain string, or content parts for multimodal turns.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ApiContent<'a> {
    Text(&'a str),
    Parts(Vec<ApiContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ApiContentPart<'a> {
    #[serde(rename = "text")]
    Text { text: &'a str },

    #[serde(rename = "image_url")]
    ImageUrl { image_url: ApiImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ApiImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
