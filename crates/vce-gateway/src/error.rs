//! Maps every error type crossing into the gateway onto the behavioral
//! taxonomy in §7: client-violation / auth-failure / capacity /
//! provider-transient / provider-fatal / internal.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use vce_core::CoreError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("client violation: {0}")]
    ClientViolation(String),
    #[error("authentication failed: {0}")]
    AuthFailure(String),
    #[error("capacity exceeded: {0}")]
    Capacity(String),
    #[error("upstream provider error: {0}")]
    ProviderTransient(String),
    #[error("upstream provider disabled: {0}")]
    ProviderFatal(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<CoreError> for GatewayError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ClientViolation(m) => GatewayError::ClientViolation(m),
            CoreError::ResourceUnavailable(m) => GatewayError::ProviderFatal(m),
            CoreError::CapacityExceeded(m) => GatewayError::Capacity(m),
            CoreError::ProviderTransient(m) => GatewayError::ProviderTransient(m),
            CoreError::ProviderFatal(m) => GatewayError::ProviderFatal(m),
            CoreError::Internal(m) => GatewayError::Internal(m),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl GatewayError {
    fn code(&self) -> &'static str {
        match self {
            Self::ClientViolation(_) => "client_violation",
            Self::AuthFailure(_) => "auth_failure",
            Self::Capacity(_) => "capacity_exceeded",
            Self::ProviderTransient(_) => "provider_transient",
            Self::ProviderFatal(_) => "provider_fatal",
            Self::Internal(_) => "internal_error",
            Self::NotFound(_) => "not_found",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::ClientViolation(_) => StatusCode::BAD_REQUEST,
            Self::AuthFailure(_) => StatusCode::UNAUTHORIZED,
            Self::Capacity(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::ProviderTransient(_) => StatusCode::BAD_GATEWAY,
            Self::ProviderFatal(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), axum::Json(body)).into_response()
    }
}
