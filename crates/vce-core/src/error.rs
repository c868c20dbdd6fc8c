//! Shared error taxonomy for the voice gateway core.
//!
//! Each adapter crate defines its own `thiserror` enum for its domain and
//! converts into [`CoreError`] at the boundary where it crosses into
//! gateway-wide handling (see §7 of the specification for the behavioral
//! taxonomy this maps onto).

use thiserror::Error;

/// Errors that can occur anywhere in the domain/port layer.
///
/// This is deliberately coarse: adapter crates keep their own fine-grained
/// error enums (`VadError`, `AsrError`, `LlmError`, ...) and convert into
/// this one only when the error needs to cross a crate boundary into code
/// that doesn't care about the specific adapter.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The caller violated the protocol (bad frame, wrong state transition).
    #[error("client violation: {0}")]
    ClientViolation(String),

    /// A required resource (VAD/ASR/TTS/LLM handle) was not available.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// A capacity limit (connection pool, queue) was exceeded.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// An upstream provider failed transiently (network, timeout, 5xx).
    #[error("provider transient error: {0}")]
    ProviderTransient(String),

    /// An upstream provider failed in a way that disables the capability
    /// (auth failure, permanent rejection).
    #[error("provider fatal error: {0}")]
    ProviderFatal(String),

    /// Anything else unexpected.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Build an [`CoreError::Internal`] from any `Display`-able error,
    /// the way every callback boundary in the gateway must: log and convert,
    /// never let a panic escape into a provider's event loop.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }
}
