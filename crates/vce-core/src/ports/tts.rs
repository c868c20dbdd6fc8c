use async_trait::async_trait;

use crate::error::CoreError;

/// Streaming text-to-speech over one utterance at a time (§4.3).
///
/// `on_audio` is invoked with `Some(bytes)` for each synthesized chunk
/// and `None` once for end-of-utterance, mirroring the "empty chunk
/// sentinel" framing used on both the realtime callback and the
/// [`TtsCache`] queue.
#[async_trait]
pub trait TtsDriver: Send + Sync {
    fn set_callback(&mut self, on_audio: Box<dyn Fn(Option<Vec<u8>>) + Send + Sync>);

    /// Start a new request against the shared [`TtsCache`], returning its
    /// id so the gateway can publish `conversation.audio.url` before any
    /// audio has actually been produced.
    async fn begin_request(&mut self) -> String;

    /// Push one increment of text. `is_final` signals end-of-utterance;
    /// the driver still flushes any buffered subtask before emitting the
    /// sentinel.
    async fn query(&mut self, text: &str, is_final: bool) -> Result<(), CoreError>;

    /// Stop all pending/in-flight synthesis for the current utterance.
    async fn stop(&mut self) -> Result<(), CoreError>;
}

/// Per-request audio buffering that lets an HTTP pull endpoint observe
/// audio a driver is still producing over the WebSocket (§4.3).
#[async_trait]
pub trait TtsCache: Send + Sync {
    /// Start a new request, returning its id. At most `maxsize`
    /// concurrent entries are kept; exceeding it evicts the oldest
    /// completed entry.
    async fn create_new_request(&self) -> String;

    /// Append one chunk, or `None` for the end-of-utterance sentinel.
    async fn append_audio_delta(&self, request_id: &str, chunk: Option<Vec<u8>>);

    /// Fetch the next buffered chunk for `request_id`, waiting up to the
    /// configured per-chunk timeout. Returns `Ok(None)` on sentinel or
    /// timeout (a timeout ends the generator without erroring, per
    /// §4.3), `Err` if the request id is unknown or expired.
    async fn next_chunk(&self, request_id: &str) -> Result<Option<Vec<u8>>, CoreError>;
}
