//! HTTP chat client and the visible message list it maintains.

use crate::decoder::{DeltaSink, MessageBuffer, decode_stream};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use secondbrain_core::message::{ConversationTurn, Role};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Shown in place of a reply whose stream broke part way through.
pub const FALLBACK_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    PaymentRequired(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Client setup failed: {0}")]
    Client(String),
}

#[derive(Serialize)]
struct ChatBody<'a> {
    messages: &'a [ConversationTurn],
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Posts conversations to a chat endpoint and returns the raw reply stream.
#[derive(Clone)]
pub struct ChatClient {
    endpoint: String,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| ClientError::Client(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Start a chat request. Errors here happen before any reply bytes arrive.
    pub async fn open(
        &self,
        turns: &[ConversationTurn],
    ) -> Result<BoxStream<'static, Result<Bytes, reqwest::Error>>, ClientError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ChatBody { messages: turns })
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            return Ok(response.bytes_stream().boxed());
        }

        let raw = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&raw)
            .map(|b| b.error)
            .unwrap_or(raw);
        warn!(status, %message, "Chat request rejected");

        Err(match status {
            429 => ClientError::RateLimited(message),
            402 => ClientError::PaymentRequired(message),
            _ => ClientError::Server { status, message },
        })
    }
}

/// A conversation as the user sees it.
pub struct ChatSession {
    client: ChatClient,
    messages: Vec<MessageBuffer>,
}

impl ChatSession {
    pub fn new(client: ChatClient) -> Self {
        Self {
            client,
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[MessageBuffer] {
        &self.messages
    }

    fn turns(&self) -> Vec<ConversationTurn> {
        self.messages
            .iter()
            .map(|m| match m.role {
                Role::Assistant => ConversationTurn::assistant(m.text.clone()),
                Role::System => ConversationTurn::system(m.text.clone()),
                Role::User => ConversationTurn::user(m.text.clone()),
            })
            .collect()
    }

    /// Send a user message and stream the reply into a new assistant message.
    ///
    /// If the request is refused no assistant message is created. If the
    /// stream breaks after it started, the partial reply is replaced by
    /// [`FALLBACK_MESSAGE`].
    pub async fn send(
        &mut self,
        content: &str,
        sink: &mut impl DeltaSink,
    ) -> Result<&MessageBuffer, ClientError> {
        self.messages.push(MessageBuffer::new(Role::User, content));

        let stream = self.client.open(&self.turns()).await?;

        let mut reply = MessageBuffer::assistant();
        if let Err(e) = decode_stream(stream, &mut reply, &mut *sink).await {
            warn!(error = %e, partial_chars = reply.text.chars().count(), "Reply stream interrupted");
            reply.text = FALLBACK_MESSAGE.to_string();
            sink.on_delta(&reply.id, &reply.text);
        } else {
            debug!(chars = reply.text.chars().count(), "Reply complete");
        }

        self.messages.push(reply);
        Ok(&self.messages[self.messages.len() - 1])
    }
}
