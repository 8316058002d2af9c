//! Unified error handling for the relay.
//!
//! Every failure on the request path ends up as a `RelayError`, which renders
//! as `{"error": "<message>"}` with a status code the browser front can act on.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Unified error type for relay operations.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayError {
    /// Request body could not be decoded.
    InvalidBody(String),
    /// Request body exceeded the configured limit.
    BodyTooLarge,
    /// Request carried no recipe content.
    MissingContent,
    /// Multipart upload carried no `file` part.
    MissingFile,
    /// Uploaded file has an extension we cannot read.
    UnsupportedFile(String),
    /// Uploaded file could not be turned into text.
    Extraction(String),
    /// No upstream API key configured on the server.
    ApiKeyMissing,
    /// Upstream API answered with a non-success status.
    Upstream { status: u16, message: String },
    /// Upstream API could not be reached.
    Request(String),
    /// Upstream answer could not be parsed into a report.
    Parse(String),
    /// Label rendering failed.
    Render(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBody(msg) => write!(f, "Invalid request body: {}", msg),
            Self::BodyTooLarge => write!(f, "Request body too large"),
            Self::MissingContent => write!(f, "Missing content"),
            Self::MissingFile => write!(f, "No file provided"),
            Self::UnsupportedFile(ext) => write!(f, "Unsupported file type: .{}", ext),
            Self::Extraction(msg) => write!(f, "Failed to extract text: {}", msg),
            Self::ApiKeyMissing => write!(f, "API key not configured on the server"),
            Self::Upstream { message, .. } => write!(f, "{}", message),
            Self::Request(msg) => write!(f, "Upstream request failed: {}", msg),
            Self::Parse(msg) => write!(f, "Parse error: {}", msg),
            Self::Render(msg) => write!(f, "Label rendering failed: {}", msg),
        }
    }
}

impl std::error::Error for RelayError {}

/// Error response structure for JSON serialization.
#[derive(Serialize)]
struct ErrorResponseBody {
    error: String,
}

impl RelayError {
    /// Get the HTTP status code for this error.
    ///
    /// Upstream statuses are mirrored; anything that is not a valid status
    /// code falls back to 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::MissingContent => StatusCode::BAD_REQUEST,
            Self::MissingFile => StatusCode::BAD_REQUEST,
            Self::UnsupportedFile(_) => StatusCode::BAD_REQUEST,
            Self::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ApiKeyMissing => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Request(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Parse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidBody(_)
            | Self::BodyTooLarge
            | Self::MissingContent
            | Self::MissingFile => "invalid_request",
            Self::UnsupportedFile(_) | Self::Extraction(_) => "invalid_document",
            Self::ApiKeyMissing => "configuration_error",
            Self::Upstream { .. } | Self::Request(_) => "upstream_error",
            Self::Parse(_) => "parse_error",
            Self::Render(_) => "internal_error",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponseBody {
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
