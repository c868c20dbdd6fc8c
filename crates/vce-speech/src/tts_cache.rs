//! `TTSCache`: per-request audio buffering shared between the realtime
//! WebSocket push and the HTTP pull endpoint (§4.3).
//!
//! Entries are held in a [`moka::future::Cache`] bounded by entry count
//! and TTL, matching the cachetools `TTLCache` the gateway's Python
//! predecessor used for the same purpose. Each entry is an append-only
//! queue until the producer appends the sentinel `None`, after which it
//! is read-only.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;
use vce_core::error::CoreError;
use vce_core::ports::TtsCache as TtsCachePort;

use crate::error::TtsError;

struct RequestQueue {
    chunks: Mutex<VecDeque<Option<Vec<u8>>>>,
    notify: Notify,
}

impl RequestQueue {
    fn new() -> Self {
        Self {
            chunks: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }
}

pub struct MokaTtsCache {
    cache: Cache<String, Arc<RequestQueue>>,
    chunk_timeout: Duration,
}

impl MokaTtsCache {
    /// `maxsize` bounds the number of concurrent request ids (default 10
    /// per §3); `ttl` is the entry lifetime (default 3600s); `chunk_timeout`
    /// is how long a reader waits for the next chunk before giving up
    /// without erroring (default 30s).
    pub fn new(maxsize: u64, ttl: Duration, chunk_timeout: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(maxsize)
            .time_to_live(ttl)
            .build();
        Self {
            cache,
            chunk_timeout,
        }
    }
}

impl Default for MokaTtsCache {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(3600), Duration::from_secs(30))
    }
}

#[async_trait]
impl TtsCachePort for MokaTtsCache {
    async fn create_new_request(&self) -> String {
        let request_id = format!("tts_req_{}", Uuid::new_v4().simple());
        self.cache
            .insert(request_id.clone(), Arc::new(RequestQueue::new()))
            .await;
        request_id
    }

    async fn append_audio_delta(&self, request_id: &str, chunk: Option<Vec<u8>>) {
        if let Some(queue) = self.cache.get(request_id).await {
            queue.chunks.lock().await.push_back(chunk);
            queue.notify.notify_waiters();
        }
        // Silently drop appends to an unknown/expired id: the producer
        // task may outlive a reader that never attached.
    }

    async fn next_chunk(&self, request_id: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let queue = self
            .cache
            .get(request_id)
            .await
            .ok_or_else(|| TtsError::UnknownRequest(request_id.to_string()))?;

        loop {
            {
                let mut chunks = queue.chunks.lock().await;
                if let Some(chunk) = chunks.pop_front() {
                    return Ok(chunk);
                }
            }
            let notified = queue.notify.notified();
            tokio::select! {
                () = notified => continue,
                () = tokio::time::sleep(self.chunk_timeout) => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buffered_chunks_are_observed_in_order() {
        let cache = MokaTtsCache::default();
        let id = cache.create_new_request().await;
        cache
            .append_audio_delta(&id, Some(vec![1, 2, 3]))
            .await;
        cache
            .append_audio_delta(&id, Some(vec![4, 5, 6]))
            .await;
        cache.append_audio_delta(&id, None).await;

        assert_eq!(cache.next_chunk(&id).await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(cache.next_chunk(&id).await.unwrap(), Some(vec![4, 5, 6]));
        assert_eq!(cache.next_chunk(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unknown_request_id_errors() {
        let cache = MokaTtsCache::default();
        let err = cache.next_chunk("does-not-exist").await.unwrap_err();
        assert!(matches!(err, CoreError::ResourceUnavailable(_)));
    }

    #[tokio::test]
    async fn chunk_timeout_ends_generator_without_error() {
        let cache = MokaTtsCache::new(10, Duration::from_secs(3600), Duration::from_millis(20));
        let id = cache.create_new_request().await;
        let result = cache.next_chunk(&id).await.unwrap();
        assert_eq!(result, None);
    }
}
