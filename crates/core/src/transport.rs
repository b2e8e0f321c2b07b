//! The model transport abstraction.
//!
//! A transport yields raw text fragments. All tool semantics live in the tag
//! protocol embedded in that text; the transport knows nothing about tools,
//! which is what lets the same classifier sit behind any backend.

use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A chat message rendered for the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportMessage {
    /// Wire role: "system", "user", or "assistant".
    pub role: String,
    pub content: String,
}

impl TransportMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// A request for one streamed completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportRequest {
    /// Model identifier
    pub model: String,

    /// Conversation rendered as wire messages
    pub messages: Vec<TransportMessage>,

    /// Sampling temperature
    pub temperature: f32,

    /// Max tokens for the response (None = provider default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Token usage counts for a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single fragment of a streamed completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamFragment {
    /// Text delta, if this fragment carries one.
    pub content: Option<String>,

    /// True on the final fragment of the stream.
    pub done: bool,

    /// Token usage, reported with the final fragment when available.
    pub usage: Option<Usage>,
}

impl StreamFragment {
    /// A text-carrying fragment.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            done: false,
            usage: None,
        }
    }

    /// The terminal fragment.
    pub fn finished(usage: Option<Usage>) -> Self {
        Self {
            content: None,
            done: true,
            usage,
        }
    }
}

/// A streaming LLM transport.
///
/// Implementations: `SseTransport` for OpenAI-compatible endpoints, and
/// `ScriptedTransport` for tests.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &str;

    /// Start a streamed completion.
    ///
    /// Fragments arrive on the returned channel; the final fragment has
    /// `done = true`. Mid-stream failures arrive as `Err` items and end the
    /// stream.
    async fn stream(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamFragment, TransportError>>,
        TransportError,
    >;
}
