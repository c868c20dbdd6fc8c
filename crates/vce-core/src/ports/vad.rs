use async_trait::async_trait;

use crate::domain::AudioFrame;
use crate::error::CoreError;

/// Voice activity endpointing over a stream of fixed-size PCM frames
/// (§4.1). Implementations are expected to be non-suspending (CPU-only
/// classification) per the concurrency model in §5.
#[async_trait]
pub trait Vad: Send + Sync {
    /// Classify one frame and update internal hysteresis state.
    ///
    /// Returns `true` exactly when `speech_active` flipped as a result of
    /// this frame.
    async fn process_frame(&mut self, frame: &AudioFrame) -> Result<bool, CoreError>;

    /// Reset hysteresis state to "not speaking, zero run-lengths".
    fn reset(&mut self);

    /// Release any resources. Calls after close must fail.
    fn close(&mut self);

    /// Current hysteretic `speech_active` flag.
    fn is_speech_active(&self) -> bool;
}
