//! The chat pipeline: retrieve, assemble, relay.

use crate::prompt::{AssembledRequest, assemble};
use crate::retriever::ContextRetriever;
use secondbrain_core::error::ProviderError;
use secondbrain_core::message::ConversationTurn;
use secondbrain_core::provider::{ByteStream, Provider, ProviderRequest};
use std::sync::Arc;
use tracing::{info, warn};

/// Why a chat call failed before any bytes were relayed.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Payment required. Please add credits to continue.")]
    PaymentRequired,

    /// Any other upstream failure; the detail is for logs only.
    #[error("AI service error")]
    Upstream(String),
}

impl ChatError {
    /// HTTP status reported to the caller.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::RateLimited { .. } => 429,
            Self::PaymentRequired => 402,
            Self::Upstream(_) => 500,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::PaymentRequired => "payment_required",
            Self::Upstream(_) => "upstream_error",
        }
    }
}

impl From<ProviderError> for ChatError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::RateLimited { retry_after_secs } => Self::RateLimited { retry_after_secs },
            ProviderError::PaymentRequired(_) => Self::PaymentRequired,
            other => Self::Upstream(other.to_string()),
        }
    }
}

/// Answers a conversation from the knowledge base, streaming the reply.
pub struct ChatPipeline {
    retriever: ContextRetriever,
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
}

impl ChatPipeline {
    pub fn new(
        retriever: ContextRetriever,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            retriever,
            provider,
            model: model.into(),
            temperature,
        }
    }

    /// Retrieve context and build the augmented request.
    pub async fn prepare(&self, turns: Vec<ConversationTurn>) -> AssembledRequest {
        let excerpts = self.retriever.retrieve(&turns).await;
        info!(excerpts = excerpts.len(), turns = turns.len(), "Chat request - found relevant items");
        assemble(&excerpts, turns)
    }

    /// Run one chat call and return the backend's event stream unmodified.
    ///
    /// No retries: each call maps to exactly one upstream request.
    pub async fn run(&self, turns: Vec<ConversationTurn>) -> Result<ByteStream, ChatError> {
        let assembled = self.prepare(turns).await;

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: assembled.messages(),
            temperature: self.temperature,
            max_tokens: None,
            stream: assembled.streaming,
        };

        self.provider.stream_bytes(request).await.map_err(|e| {
            warn!(provider = self.provider.name(), error = %e, "Upstream chat request failed");
            ChatError::from(e)
        })
    }
}
