//! Streaming ASR driver (§4.2): coalesces audio chunks before handing
//! them to a pluggable [`SpeechProvider`], and fans provider partial/final
//! callbacks onward to the session.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use vce_core::error::CoreError;
use vce_core::ports::{AsrCallbacks, AsrDriver};

use crate::error::AsrError;

/// Number of frames to batch before forwarding to the provider (~450ms
/// at 30ms/frame), per §4.2's "batch ~15 frames" guidance.
pub const COALESCE_FRAMES: usize = 15;

/// One active or finished recognition request.
struct RequestState {
    id: String,
    buffer: Vec<u8>,
    frame_count: usize,
}

/// Pluggable speech-to-text transport. Implementations own the vendor
/// wire protocol; the driver only knows how to coalesce chunks and
/// invoke callbacks.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Begin a new request with the provider, given its id.
    async fn start(&self, request_id: &str) -> Result<(), AsrError>;

    /// Forward one coalesced chunk of audio bytes.
    async fn send_chunk(&self, request_id: &str, bytes: &[u8]) -> Result<(), AsrError>;

    /// Finalize and return the complete recognized text (may be empty).
    async fn finish(&self, request_id: &str) -> Result<String, AsrError>;
}

/// Offline/test double: echoes a fixed transcript regardless of audio
/// content. Default provider for the pure-ASR mode in tests.
pub struct MockAsrProvider {
    transcript: String,
}

impl MockAsrProvider {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
        }
    }
}

impl Default for MockAsrProvider {
    fn default() -> Self {
        Self::new(String::new())
    }
}

#[async_trait]
impl SpeechProvider for MockAsrProvider {
    async fn start(&self, _request_id: &str) -> Result<(), AsrError> {
        Ok(())
    }

    async fn send_chunk(&self, _request_id: &str, _bytes: &[u8]) -> Result<(), AsrError> {
        Ok(())
    }

    async fn finish(&self, _request_id: &str) -> Result<String, AsrError> {
        Ok(self.transcript.clone())
    }
}

/// Posts coalesced chunks to a configurable vendor endpoint and parses
/// provider partial/final frames. The exact wire format is vendor
/// specific; this adapter speaks a simple "post raw PCM, read back JSON
/// `{text}`" shape suitable for the Azure/Coze-style endpoints the
/// system this was distilled from targets, and is meant to be
/// subclassed-by-config rather than forked per vendor.
pub struct HttpAsrProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpAsrProvider {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(serde::Deserialize)]
struct AsrResponse {
    text: String,
}

#[async_trait]
impl SpeechProvider for HttpAsrProvider {
    async fn start(&self, _request_id: &str) -> Result<(), AsrError> {
        Ok(())
    }

    async fn send_chunk(&self, request_id: &str, bytes: &[u8]) -> Result<(), AsrError> {
        self.client
            .post(format!("{}/chunk", self.endpoint))
            .bearer_auth(&self.api_key)
            .header("X-Request-Id", request_id)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| AsrError::Provider(e.to_string()))?;
        Ok(())
    }

    async fn finish(&self, request_id: &str) -> Result<String, AsrError> {
        let resp = self
            .client
            .post(format!("{}/finish", self.endpoint))
            .bearer_auth(&self.api_key)
            .header("X-Request-Id", request_id)
            .send()
            .await
            .map_err(|e| AsrError::Provider(e.to_string()))?
            .error_for_status()
            .map_err(|e| AsrError::Provider(e.to_string()))?
            .json::<AsrResponse>()
            .await
            .map_err(|e| AsrError::Provider(e.to_string()))?;
        Ok(resp.text)
    }
}

/// Driver implementation wrapping any [`SpeechProvider`], owning chunk
/// coalescing and callback dispatch.
pub struct AsrPipeline<P: SpeechProvider> {
    provider: Arc<P>,
    state: Mutex<Option<RequestState>>,
    callbacks: Option<AsrCallbacks>,
}

impl<P: SpeechProvider> AsrPipeline<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            state: Mutex::new(None),
            callbacks: None,
        }
    }
}

#[async_trait]
impl<P: SpeechProvider + 'static> AsrDriver for AsrPipeline<P> {
    fn set_callbacks(&mut self, callbacks: AsrCallbacks) {
        self.callbacks = Some(callbacks);
    }

    async fn stream_start(&mut self) -> Result<(), CoreError> {
        let request_id = format!("asr_req_{}", uuid::Uuid::new_v4().simple());
        self.provider
            .start(&request_id)
            .await
            .map_err(CoreError::from)?;
        *self.state.lock().await = Some(RequestState {
            id: request_id,
            buffer: Vec::new(),
            frame_count: 0,
        });
        Ok(())
    }

    async fn stream_append(&mut self, chunk: &[u8]) -> Result<(), CoreError> {
        let mut guard = self.state.lock().await;
        let state = guard.as_mut().ok_or(AsrError::NotStreaming)?;
        state.buffer.extend_from_slice(chunk);
        state.frame_count += 1;
        if state.frame_count >= COALESCE_FRAMES {
            let bytes = std::mem::take(&mut state.buffer);
            let id = state.id.clone();
            state.frame_count = 0;
            drop(guard);
            self.provider
                .send_chunk(&id, &bytes)
                .await
                .map_err(CoreError::from)?;
        }
        Ok(())
    }

    async fn stream_finish(&mut self) -> Result<(), CoreError> {
        let mut guard = self.state.lock().await;
        let mut state = guard.take().ok_or(AsrError::NotStreaming)?;
        drop(guard);

        if !state.buffer.is_empty() {
            if let Err(e) = self.provider.send_chunk(&state.id, &state.buffer).await {
                if let Some(cb) = &self.callbacks {
                    (cb.on_final)(String::new());
                }
                return Err(e.into());
            }
            state.buffer.clear();
        }

        match self.provider.finish(&state.id).await {
            Ok(text) => {
                if let Some(cb) = &self.callbacks {
                    (cb.on_final)(text);
                }
                Ok(())
            }
            Err(e) => {
                if let Some(cb) = &self.callbacks {
                    (cb.on_final)(String::new());
                }
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn append_before_start_fails() {
        let mut driver = AsrPipeline::new(Arc::new(MockAsrProvider::default()));
        let err = driver.stream_append(b"x").await.unwrap_err();
        assert!(matches!(err, CoreError::ClientViolation(_)));
    }

    #[tokio::test]
    async fn finish_fires_on_final_exactly_once() {
        let mut driver = AsrPipeline::new(Arc::new(MockAsrProvider::new("hello world")));
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();
        driver.set_callbacks(AsrCallbacks {
            on_partial: Box::new(|_| {}),
            on_final: Box::new(move |text| {
                assert_eq!(text, "hello world");
                fired2.store(true, Ordering::SeqCst);
            }),
        });
        driver.stream_start().await.unwrap();
        driver.stream_append(&[0u8; 10]).await.unwrap();
        driver.stream_finish().await.unwrap();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn append_after_finish_fails() {
        let mut driver = AsrPipeline::new(Arc::new(MockAsrProvider::default()));
        driver.stream_start().await.unwrap();
        driver.stream_finish().await.unwrap();
        let err = driver.stream_append(b"x").await.unwrap_err();
        assert!(matches!(err, CoreError::ClientViolation(_)));
    }

    #[tokio::test]
    async fn coalesces_before_sending() {
        // A fresh stream_start followed by fewer than COALESCE_FRAMES
        // appends must not error; verifies coalescing doesn't require a
        // full batch to function.
        let mut driver = AsrPipeline::new(Arc::new(MockAsrProvider::default()));
        driver.stream_start().await.unwrap();
        for _ in 0..(COALESCE_FRAMES - 1) {
            driver.stream_append(&[1, 2]).await.unwrap();
        }
        driver.stream_finish().await.unwrap();
    }
}
