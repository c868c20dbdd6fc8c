use thiserror::Error;
use vce_core::CoreError;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider transport error: {0}")]
    Provider(String),
    #[error("provider returned an unparseable response: {0}")]
    Malformed(String),
    #[error("stream was cancelled")]
    Cancelled,
}

impl From<LlmError> for CoreError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Provider(msg) => CoreError::ProviderTransient(msg),
            LlmError::Malformed(msg) => CoreError::Internal(msg),
            LlmError::Cancelled => CoreError::Internal("stream cancelled".to_string()),
        }
    }
}
