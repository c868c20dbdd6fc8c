//! Chat-completion and streaming-chat client over a vendor's
//! OpenAI-shaped API, plus the short conversation cache (§4.6).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;
use vce_core::domain::{IntentKind, Intention};
use vce_core::error::CoreError;
use vce_core::ports::{ChatMessage, LlmClient, StreamSink};
use vce_speech::chunker::{self, Language};

use crate::error::LlmError;
use crate::sse::for_each_token;

const HISTORY_DEPTH: usize = 3;

/// Two named model slots per vendor: a lite/fast model for
/// classification, a think model for long-form generation.
#[derive(Debug, Clone)]
pub struct ModelSlots {
    pub lite: String,
    pub think: String,
}

pub struct LlmPipeline {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    models: ModelSlots,
    history: Mutex<VecDeque<(String, String)>>,
    active_cancel: Mutex<Option<Arc<AtomicBool>>>,
}

impl LlmPipeline {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, models: ModelSlots) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            models,
            history: Mutex::new(VecDeque::with_capacity(HISTORY_DEPTH)),
            active_cancel: Mutex::new(None),
        }
    }

    fn build_messages(
        &self,
        text: &str,
        system_prompt: Option<&str>,
        history: &[ChatMessage],
    ) -> Vec<serde_json::Value> {
        let mut messages = Vec::new();
        if let Some(sp) = system_prompt {
            messages.push(json!({"role": "system", "content": sp}));
        }
        for m in history {
            messages.push(json!({"role": m.role, "content": m.content}));
        }
        messages.push(json!({"role": "user", "content": text}));
        messages
    }

    async fn push_history(&self, user: &str, assistant: &str) {
        let mut h = self.history.lock().await;
        if h.len() >= HISTORY_DEPTH {
            h.pop_front();
        }
        h.push_back((user.to_string(), assistant.to_string()));
    }

    async fn history_as_messages(&self) -> Vec<ChatMessage> {
        self.history
            .lock()
            .await
            .iter()
            .flat_map(|(u, a)| vec![ChatMessage::user(u.clone()), ChatMessage::assistant(a.clone())])
            .collect()
    }
}

#[async_trait]
impl LlmClient for LlmPipeline {
    async fn query(
        &self,
        text: &str,
        system_prompt: Option<&str>,
        history: &[ChatMessage],
    ) -> Result<String, CoreError> {
        let messages = self.build_messages(text, system_prompt, history);
        let body = json!({
            "model": self.models.think,
            "messages": messages,
            "stream": false,
        });
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider(e.to_string()))?
            .error_for_status()
            .map_err(|e| LlmError::Provider(e.to_string()))?;

        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;
        let reply = value["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::Malformed("missing choices[0].message.content".to_string()))?
            .to_string();
        self.push_history(text, &reply).await;
        Ok(reply)
    }

    async fn query_intention(&self, text: &str, language: &str) -> Result<Intention, CoreError> {
        let system_prompt = format!(
            "Classify the user's request into exactly one of: weather, news, music, story, joke, \
             alarm, control, chat. Reply strictly as `intent: content` in {language}."
        );
        let history = self.history_as_messages().await;
        let reply = self.query(text, Some(&system_prompt), &history).await?;

        match reply.split_once(':') {
            Some((intent_raw, content)) => Ok(Intention {
                intent: IntentKind::parse(intent_raw),
                content: content.trim().to_string(),
                user_prompt: None,
                system_prompt: None,
                meta_data: None,
            }),
            None => Ok(Intention::chat(reply)),
        }
    }

    async fn query_stream(
        &self,
        text: &str,
        user_prompt: Option<&str>,
        system_prompt: Option<&str>,
        sink: StreamSink,
    ) -> Result<(), CoreError> {
        let cancel = Arc::new(AtomicBool::new(false));
        *self.active_cancel.lock().await = Some(cancel.clone());

        let history = self.history_as_messages().await;
        let effective_text = user_prompt.unwrap_or(text);
        let messages = self.build_messages(effective_text, system_prompt, &history);
        let body = json!({
            "model": self.models.think,
            "messages": messages,
            "stream": true,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider(e.to_string()))?
            .error_for_status()
            .map_err(|e| LlmError::Provider(e.to_string()))?;

        let byte_stream = response.bytes_stream();
        let mut full_text = String::new();
        let mut pending = String::new();

        let result = for_each_token(byte_stream, |token| {
            if cancel.load(Ordering::SeqCst) {
                return;
            }
            (sink.on_text)(&token);
            full_text.push_str(&token);
            pending.push_str(&token);
            while let (Some(chunk), remainder) = chunker::split(&pending, Language::English) {
                (sink.on_chunk)(&chunk, false);
                pending = remainder;
            }
        })
        .await;

        *self.active_cancel.lock().await = None;

        if cancel.load(Ordering::SeqCst) {
            return Err(LlmError::Cancelled.into());
        }
        result.map_err(CoreError::from)?;

        if !pending.is_empty() {
            (sink.on_chunk)(&pending, true);
        }
        (sink.on_finish)(&full_text);
        self.push_history(effective_text, &full_text).await;
        Ok(())
    }

    async fn close(&self) {
        if let Some(cancel) = self.active_cancel.lock().await.take() {
            cancel.store(true, Ordering::SeqCst);
        }
        self.history.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn history_caps_at_configured_depth() {
        let pipeline = LlmPipeline::new(
            "http://localhost",
            "key",
            ModelSlots {
                lite: "lite".into(),
                think: "think".into(),
            },
        );
        for i in 0..5 {
            pipeline.push_history(&format!("u{i}"), &format!("a{i}")).await;
        }
        let h = pipeline.history.lock().await;
        assert_eq!(h.len(), HISTORY_DEPTH);
        assert_eq!(h.front().unwrap().0, "u2");
    }

    #[tokio::test]
    async fn close_clears_history_and_cancel_flag() {
        let pipeline = LlmPipeline::new(
            "http://localhost",
            "key",
            ModelSlots {
                lite: "lite".into(),
                think: "think".into(),
            },
        );
        pipeline.push_history("u", "a").await;
        let cancel = Arc::new(AtomicBool::new(false));
        *pipeline.active_cancel.lock().await = Some(cancel.clone());
        pipeline.close().await;
        assert!(cancel.load(Ordering::SeqCst));
        assert!(pipeline.history.lock().await.is_empty());
    }
}
