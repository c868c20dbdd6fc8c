use async_trait::async_trait;

use crate::error::CoreError;

/// Callbacks a driver invokes as recognition progresses (§4.2).
///
/// Boxed `Fn` rather than an associated type so a driver can be built
/// generically and rewired per-turn without re-parameterizing the whole
/// session; every callback boundary in the gateway catches and logs, so
/// these never return a `Result` the driver would have to propagate.
pub struct AsrCallbacks {
    pub on_partial: Box<dyn Fn(String) + Send + Sync>,
    pub on_final: Box<dyn Fn(String) + Send + Sync>,
}

/// Streaming speech-to-text over one utterance at a time.
#[async_trait]
pub trait AsrDriver: Send + Sync {
    /// Register the callbacks used for the lifetime of the driver
    /// instance (replaced wholesale each time, same as `set_callbacks`
    /// in §4.2).
    fn set_callbacks(&mut self, callbacks: AsrCallbacks);

    /// Begin a fresh request; any state from a prior unfinished request
    /// is discarded.
    async fn stream_start(&mut self) -> Result<(), CoreError>;

    /// Append one audio chunk. Fails with a client-violation style error
    /// if called before `stream_start` or after `stream_finish`.
    async fn stream_append(&mut self, chunk: &[u8]) -> Result<(), CoreError>;

    /// Finalize the current request; `on_final` fires exactly once as a
    /// result, synchronously or asynchronously depending on the
    /// implementation.
    async fn stream_finish(&mut self) -> Result<(), CoreError>;
}
