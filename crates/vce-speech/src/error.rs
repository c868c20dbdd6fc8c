use thiserror::Error;
use vce_core::CoreError;

#[derive(Debug, Error)]
pub enum VadError {
    #[error("frame is {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },
    #[error("vad instance is closed")]
    Closed,
}

impl From<VadError> for CoreError {
    fn from(err: VadError) -> Self {
        match err {
            VadError::FrameSize { .. } => CoreError::ClientViolation(err.to_string()),
            VadError::Closed => CoreError::ResourceUnavailable(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum AsrError {
    #[error("stream_append called before stream_start or after stream_finish")]
    NotStreaming,
    #[error("provider transport error: {0}")]
    Provider(String),
}

impl From<AsrError> for CoreError {
    fn from(err: AsrError) -> Self {
        match err {
            AsrError::NotStreaming => CoreError::ClientViolation(err.to_string()),
            AsrError::Provider(msg) => CoreError::ProviderTransient(msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("tts request id {0} is unknown or expired")]
    UnknownRequest(String),
    #[error("provider transport error: {0}")]
    Provider(String),
}

impl From<TtsError> for CoreError {
    fn from(err: TtsError) -> Self {
        match err {
            TtsError::UnknownRequest(msg) => CoreError::ResourceUnavailable(msg),
            TtsError::Provider(msg) => CoreError::ProviderTransient(msg),
        }
    }
}
