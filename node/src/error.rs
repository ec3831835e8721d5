//! API error type and its HTTP rendering.
//!
//! Every failure a handler can hit is funnelled into [`ApiError`], which
//! maps to a status code and a JSON body of the form
//! `{"error": "...", "code": "...", "recoverable": bool}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use notary_protocol::admission::AdmissionError;
use notary_protocol::storage::{BodyError, ChainError};

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,

    /// Machine-readable error code
    pub code: String,

    /// Whether the client can succeed by retrying or re-requesting
    pub recoverable: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("invalid star payload: {0}")]
    Payload(#[from] BodyError),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Chain(ChainError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Chain(ChainError::ConcurrentAppendConflict(_)) => StatusCode::CONFLICT,
            ApiError::Chain(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Admission(_) | ApiError::Payload(_) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Chain(e) => match e {
                ChainError::NotFound(_) => "NOT_FOUND",
                ChainError::CorruptRecord { .. } => "CORRUPT_RECORD",
                ChainError::ConcurrentAppendConflict(_) => "APPEND_CONFLICT",
                ChainError::WriteFailure(_) => "WRITE_FAILURE",
                ChainError::Backend(_) => "STORAGE_ERROR",
                ChainError::Serialization(_) => "SERIALIZATION_ERROR",
            },
            ApiError::Admission(e) => match e {
                AdmissionError::WindowExpired { .. } => "WINDOW_EXPIRED",
                AdmissionError::NotAuthorized { .. } => "NOT_AUTHORIZED",
                AdmissionError::SignatureInvalid(_) => "SIGNATURE_INVALID",
            },
            ApiError::Payload(_) => "INVALID_PAYLOAD",
            ApiError::BadRequest(_) => "BAD_REQUEST",
        }
    }

    /// Conflicts can be retried as-is; admission failures are cured by
    /// re-requesting or re-signing.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ApiError::Chain(ChainError::ConcurrentAppendConflict(_)) | ApiError::Admission(_)
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: self.error_code().to_string(),
            recoverable: self.is_recoverable(),
        };

        (status, Json(body)).into_response()
    }
}
