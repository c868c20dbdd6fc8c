//! Streaming TTS driver (§4.3): queues incremental text subtasks, paces
//! synthesis, and fans resulting audio to both the realtime callback and
//! the [`vce_core::ports::TtsCache`] for HTTP pull.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use vce_core::error::CoreError;
use vce_core::ports::{TtsCache as TtsCachePort, TtsDriver};

use crate::error::TtsError;

/// Minimum spacing between consecutive synthesis acks, enforcing
/// deterministic output ordering per §4.3.
const PACING_GATE: Duration = Duration::from_millis(100);

/// Pluggable speech synthesis transport.
#[async_trait]
pub trait SynthesisProvider: Send + Sync {
    /// Synthesize `text` and return one or more audio chunks, in
    /// playback order.
    async fn synthesize(&self, text: &str) -> Result<Vec<Vec<u8>>, TtsError>;
}

/// Offline/test double: returns the UTF-8 bytes of the text as a single
/// "audio" chunk, which is enough to exercise ordering/sentinel
/// semantics in tests without a real vendor.
pub struct MockTtsProvider;

#[async_trait]
impl SynthesisProvider for MockTtsProvider {
    async fn synthesize(&self, text: &str) -> Result<Vec<Vec<u8>>, TtsError> {
        Ok(vec![text.as_bytes().to_vec()])
    }
}

/// Posts finalized sentence chunks to a vendor endpoint and streams back
/// raw PCM/MP3.
pub struct HttpTtsProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    voice: String,
}

impl HttpTtsProvider {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            voice: voice.into(),
        }
    }
}

#[async_trait]
impl SynthesisProvider for HttpTtsProvider {
    async fn synthesize(&self, text: &str) -> Result<Vec<Vec<u8>>, TtsError> {
        let resp = self
            .client
            .post(format!("{}/synthesize", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "text": text, "voice": self.voice }))
            .send()
            .await
            .map_err(|e| TtsError::Provider(e.to_string()))?
            .error_for_status()
            .map_err(|e| TtsError::Provider(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| TtsError::Provider(e.to_string()))?;
        Ok(vec![resp.to_vec()])
    }
}

type AudioCallback = Box<dyn Fn(Option<Vec<u8>>) + Send + Sync>;

/// Driver implementation wrapping any [`SynthesisProvider`].
pub struct TtsPipeline<P: SynthesisProvider> {
    provider: Arc<P>,
    cache: Arc<dyn TtsCachePort>,
    current_request_id: Mutex<Option<String>>,
    on_audio: Option<AudioCallback>,
}

impl<P: SynthesisProvider> TtsPipeline<P> {
    pub fn new(provider: Arc<P>, cache: Arc<dyn TtsCachePort>) -> Self {
        Self {
            provider,
            cache,
            current_request_id: Mutex::new(None),
            on_audio: None,
        }
    }

    fn emit(&self, chunk: Option<&[u8]>) {
        if let Some(cb) = &self.on_audio {
            cb(chunk.map(|c| c.to_vec()));
        }
    }
}

#[async_trait]
impl<P: SynthesisProvider + 'static> TtsDriver for TtsPipeline<P> {
    fn set_callback(&mut self, on_audio: Box<dyn Fn(Option<Vec<u8>>) + Send + Sync>) {
        self.on_audio = Some(on_audio);
    }

    async fn begin_request(&mut self) -> String {
        let id = self.cache.create_new_request().await;
        *self.current_request_id.lock().await = Some(id.clone());
        id
    }

    async fn query(&mut self, text: &str, is_final: bool) -> Result<(), CoreError> {
        let request_id = self.current_request_id.lock().await.clone();
        let request_id = request_id.ok_or(TtsError::UnknownRequest("no active request".into()))?;

        if !text.is_empty() {
            let chunks = self.provider.synthesize(text).await.map_err(CoreError::from)?;
            for chunk in chunks {
                self.emit(Some(&chunk));
                self.cache.append_audio_delta(&request_id, Some(chunk)).await;
                tokio::time::sleep(PACING_GATE).await;
            }
        }

        if is_final {
            self.emit(None);
            self.cache.append_audio_delta(&request_id, None).await;
            *self.current_request_id.lock().await = None;
        }

        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CoreError> {
        if let Some(request_id) = self.current_request_id.lock().await.take() {
            self.emit(None);
            self.cache.append_audio_delta(&request_id, None).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts_cache::MokaTtsCache;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn emits_sentinel_on_final() {
        let cache: Arc<dyn TtsCachePort> = Arc::new(MokaTtsCache::default());
        let mut driver = TtsPipeline::new(Arc::new(MockTtsProvider), cache.clone());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        driver.set_callback(Box::new(move |chunk| {
            if chunk.is_none() {
                calls2.fetch_add(1, Ordering::SeqCst);
            }
        }));

        let id = driver.begin_request().await;
        driver.query("hello", false).await.unwrap();
        driver.query("", true).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.next_chunk(&id).await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(cache.next_chunk(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn query_without_active_request_fails() {
        let cache: Arc<dyn TtsCachePort> = Arc::new(MokaTtsCache::default());
        let mut driver = TtsPipeline::new(Arc::new(MockTtsProvider), cache);
        let err = driver.query("hi", false).await.unwrap_err();
        assert!(matches!(err, CoreError::ResourceUnavailable(_)));
    }

    #[tokio::test]
    async fn stop_emits_sentinel() {
        let cache: Arc<dyn TtsCachePort> = Arc::new(MokaTtsCache::default());
        let mut driver = TtsPipeline::new(Arc::new(MockTtsProvider), cache.clone());
        let id = driver.begin_request().await;
        driver.stop().await.unwrap();
        assert_eq!(cache.next_chunk(&id).await.unwrap(), None);
    }
}
