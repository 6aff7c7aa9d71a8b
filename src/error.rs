// Typed error taxonomy plus the bit-exact external error envelope.
//
// Handlers return `Result<T>` from this module; the `IntoResponse` impl on
// `Error` is the single place that maps every error variant to the wire
// shape clients depend on.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed request: {0}")]
    ClientError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("authentication error: {0}")]
    AuthError(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("remote service error: {0}")]
    RemoteServiceError(String),

    #[error("tool error: {0}")]
    ToolError(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// `error_type` values named by the spec; tool-specific subtypes are carried
/// in `error_subtype` instead of growing this enum.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    BadRequest,
    ValueError,
    ServerError,
}

impl Error {
    fn error_code(&self) -> &'static str {
        match self {
            Error::ClientError(_) => "400",
            Error::NotFound(_) => "404",
            Error::AuthError(_) => "401",
            Error::StoreUnavailable(_) => "500",
            Error::SchemaMismatch(_) => "500",
            Error::RemoteServiceError(_) => "502",
            Error::ToolError(_) => "500",
            Error::Internal(_) => "500",
        }
    }

    fn error_type(&self) -> ErrorType {
        match self {
            Error::ClientError(_) => ErrorType::BadRequest,
            Error::NotFound(_) => ErrorType::ValueError,
            Error::AuthError(_) => ErrorType::ValueError,
            Error::SchemaMismatch(_) => ErrorType::ServerError,
            Error::StoreUnavailable(_) => ErrorType::ServerError,
            Error::RemoteServiceError(_) => ErrorType::ServerError,
            Error::ToolError(_) => ErrorType::ServerError,
            Error::Internal(_) => ErrorType::ServerError,
        }
    }

    fn error_subtype(&self) -> Option<&'static str> {
        match self {
            Error::StoreUnavailable(_) => Some("STORE_UNAVAILABLE"),
            Error::SchemaMismatch(_) => Some("SCHEMA_MISMATCH"),
            Error::RemoteServiceError(_) => Some("REMOTE_SERVICE_ERROR"),
            Error::ToolError(_) => Some("TOOL_ERROR"),
            _ => None,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::ClientError(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AuthError(_) => StatusCode::UNAUTHORIZED,
            Error::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::SchemaMismatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::RemoteServiceError(_) => StatusCode::BAD_GATEWAY,
            Error::ToolError(_) => StatusCode::OK, // surfaced inside the tool envelope, not as HTTP 500
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Full backtrace-ish context for local debugging; empty for client-facing variants.
    fn traceback(&self) -> String {
        match self {
            Error::Internal(err) => format!("{err:?}"),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorEnvelope {
    pub error_code: String,
    pub error_type: ErrorType,
    pub error_subtype: Option<String>,
    pub error_message: String,
    pub traceback: String,
}

impl From<&Error> for ErrorEnvelope {
    fn from(err: &Error) -> Self {
        Self {
            error_code: err.error_code().to_owned(),
            error_type: err.error_type(),
            error_subtype: err.error_subtype().map(str::to_owned),
            error_message: err.to_string(),
            traceback: err.traceback(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if let Error::Internal(ref inner) = self {
            tracing::error!(err = ?inner, "internal error");
        }
        let status = self.status_code();
        let envelope = ErrorEnvelope::from(&self);
        (status, Json(envelope)).into_response()
    }
}
