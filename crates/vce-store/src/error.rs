use thiserror::Error;
use vce_core::CoreError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("distributed store transport error: {0}")]
    Transport(String),
    #[error("stored value for field {field} could not be parsed: {reason}")]
    Unparseable { field: String, reason: String },
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transport(msg) => CoreError::ProviderTransient(msg),
            StoreError::Unparseable { .. } => CoreError::Internal(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Transport(err.to_string())
    }
}
