//! VAD, ASR/TTS provider adapters, the TTS audio cache, the sentence
//! chunker, and the generic resource pool (C1–C4, and the pool half of
//! C9).

pub mod asr;
pub mod chunker;
pub mod error;
pub mod pool;
pub mod tts;
pub mod tts_cache;
pub mod vad;

pub use asr::{AsrPipeline, HttpAsrProvider, MockAsrProvider, SpeechProvider};
pub use chunker::{split, Language};
pub use error::{AsrError, TtsError, VadError};
pub use pool::ResourcePool;
pub use tts::{HttpTtsProvider, MockTtsProvider, SynthesisProvider, TtsPipeline};
pub use tts_cache::MokaTtsCache;
pub use vad::EnergyVad;
