//! Port traits: the shapes adapter crates implement. No I/O lives here.

mod asr;
mod connection_registry;
mod device_repository;
mod llm;
mod tts;
mod vad;

pub use asr::{AsrCallbacks, AsrDriver};
pub use connection_registry::ConnectionRegistry;
pub use device_repository::DeviceRepository;
pub use llm::{ChatMessage, LlmClient, StreamSink};
pub use tts::{TtsCache, TtsDriver};
pub use vad::Vad;
