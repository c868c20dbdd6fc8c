use async_trait::async_trait;

use crate::domain::Intention;
use crate::error::CoreError;

/// One turn of conversation history, or the live user turn when
/// `role == "user"` and it's the last element passed to a query.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Callbacks driven by a streaming turn, in the order guaranteed by §5:
/// `on_text` precedes the `on_chunk`s derived from it, `on_finish` is
/// last.
pub struct StreamSink {
    pub on_text: Box<dyn Fn(&str) + Send + Sync>,
    pub on_chunk: Box<dyn Fn(&str, bool) + Send + Sync>,
    pub on_finish: Box<dyn Fn(&str) + Send + Sync>,
}

/// Chat-completion and streaming-chat abstraction over a vendor, plus
/// intent classification (§4.6).
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Non-streaming chat completion.
    async fn query(
        &self,
        text: &str,
        system_prompt: Option<&str>,
        history: &[ChatMessage],
    ) -> Result<String, CoreError>;

    /// Top-level intent classification against the lite model slot.
    async fn query_intention(&self, text: &str, language: &str) -> Result<Intention, CoreError>;

    /// Streaming chat completion driving `sink`'s callbacks.
    async fn query_stream(
        &self,
        text: &str,
        user_prompt: Option<&str>,
        system_prompt: Option<&str>,
        sink: StreamSink,
    ) -> Result<(), CoreError>;

    /// Stop any in-flight stream and flush the conversation cache.
    async fn close(&self);
}
