//! LLM client abstraction, streaming sentence-chunked turn processing,
//! intent classification, and the per-(intent, language) action
//! registry (C5, C6).

pub mod actions;
pub mod client;
pub mod error;
pub mod intent;
mod sse;

pub use client::{LlmPipeline, ModelSlots};
pub use error::LlmError;
pub use intent::IntentClassifier;
