//! Per-connection session (§4.8): owns one VAD+ASR+TTS+LLM quadruple and
//! the outbound event queue that the WebSocket sender task drains.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use vce_core::domain::SessionId;
use vce_core::events::EventEnvelope;
use vce_core::ports::{AsrDriver, LlmClient, TtsDriver, Vad};

use crate::pool::Closeable;

/// A handle acquired from a resource pool, released back on session
/// close. `None` means the acquisition failed at `init()` time; an
/// operation needing it then surfaces `ResourceUnavailable` at the call
/// site rather than here.
pub struct Session {
    pub id: SessionId,
    pub uid: String,
    pub vad: Mutex<Option<Box<dyn Vad>>>,
    pub asr: Mutex<Option<Box<dyn AsrDriver>>>,
    pub tts: Mutex<Option<Box<dyn TtsDriver>>>,
    pub llm: Option<Arc<dyn LlmClient>>,
    outbound_tx: tokio::sync::mpsc::Sender<EventEnvelope>,
    outbound_rx: Mutex<Option<tokio::sync::mpsc::Receiver<EventEnvelope>>>,
    closed: AtomicBool,
    last_activity_epoch_secs: AtomicI64,
}

impl Session {
    pub fn new(
        uid: String,
        queue_capacity: usize,
        vad: Option<Box<dyn Vad>>,
        asr: Option<Box<dyn AsrDriver>>,
        tts: Option<Box<dyn TtsDriver>>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        let (tx, rx) = tokio::sync::mpsc::channel(queue_capacity);
        Self {
            id: SessionId::new(),
            uid,
            vad: Mutex::new(vad),
            asr: Mutex::new(asr),
            tts: Mutex::new(tts),
            llm,
            outbound_tx: tx,
            outbound_rx: Mutex::new(Some(rx)),
            closed: AtomicBool::new(false),
            last_activity_epoch_secs: AtomicI64::new(Utc::now().timestamp()),
        }
    }

    /// Enqueue an event. Blocks the producer if the queue is full,
    /// per §3's "block producer then log if blocked > threshold" drop
    /// policy; events are never reordered or silently dropped.
    pub async fn push_event(&self, event: EventEnvelope) {
        self.touch();
        if self.outbound_tx.send(event).await.is_err() {
            warn!(uid = %self.uid, "outbound queue receiver gone, event dropped at shutdown");
        }
    }

    /// Record activity for the idle monitor in §4.10.
    pub fn touch(&self) {
        self.last_activity_epoch_secs
            .store(Utc::now().timestamp(), Ordering::SeqCst);
    }

    /// Seconds since the last recorded activity.
    pub fn idle_seconds(&self) -> i64 {
        (Utc::now().timestamp() - self.last_activity_epoch_secs.load(Ordering::SeqCst)).max(0)
    }

    /// Taken exactly once by the WebSocket sender task.
    pub async fn take_receiver(&self) -> Option<tokio::sync::mpsc::Receiver<EventEnvelope>> {
        self.outbound_rx.lock().await.take()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Closeable for Session {
    /// Idempotent: releases the four handles (each reset to whatever
    /// "idle" means for that driver) and drops the outbound sender so the
    /// sender task's receive loop ends.
    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(uid = %self.uid, "closing session");

        if let Some(mut vad) = self.vad.lock().await.take() {
            vad.close();
        }
        if let Some(mut asr) = self.asr.lock().await.take() {
            let _ = asr.stream_finish().await;
        }
        if let Some(mut tts) = self.tts.lock().await.take() {
            let _ = tts.stop().await;
        }
        if let Some(llm) = &self.llm {
            llm.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vce_core::events::OutboundEvent;

    #[tokio::test]
    async fn close_is_idempotent() {
        let session = Session::new("uid-1".to_string(), 8, None, None, None, None);
        session.close().await;
        session.close().await;
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn push_then_receive_preserves_order() {
        let session = Session::new("uid-1".to_string(), 8, None, None, None, None);
        let mut rx = session.take_receiver().await.unwrap();
        session
            .push_event(EventEnvelope::new(
                "1",
                "log",
                OutboundEvent::InputAudioBufferCompleted,
            ))
            .await;
        session
            .push_event(EventEnvelope::new(
                "2",
                "log",
                OutboundEvent::ConversationAudioCompleted,
            ))
            .await;
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.id, "1");
        assert_eq!(second.id, "2");
    }
}
