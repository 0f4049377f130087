//! Structured error types with machine-readable codes for API clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error response for API clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Additional error context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Archive error types with proper categorization
#[derive(Debug)]
pub enum ArchiveError {
    // Validation errors (400)
    InvalidThought { field: String, reason: String },

    // Authorization (403)
    AccessDenied(String),

    // Not found (404)
    NotFound(String),

    // External collaborator failures
    EmbeddingFailed(String),
    ExtractionFailed(String),

    // Lookup deadline (504); the matchmaker degrades this to MISS on the
    // query path, so it only surfaces when a caller asks for the raw error
    DeadlineExceeded,

    // Fatal: an invariant between the three indices is broken (500)
    IndexInconsistency(String),

    // Snapshot I/O (500)
    StorageError(String),
    SerializationError(String),

    // Generic wrapper for external errors
    Internal(anyhow::Error),
}

impl ArchiveError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidThought {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Get error code for client identification
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidThought { .. } => "INVALID_THOUGHT",
            Self::AccessDenied(_) => "ACCESS_DENIED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::EmbeddingFailed(_) => "EMBEDDING_FAILED",
            Self::ExtractionFailed(_) => "EXTRACTION_FAILED",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::IndexInconsistency(_) => "INDEX_INCONSISTENCY",
            Self::StorageError(_) => "STORAGE_ERROR",
            Self::SerializationError(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidThought { .. } => StatusCode::BAD_REQUEST,

            Self::AccessDenied(_) => StatusCode::FORBIDDEN,

            Self::NotFound(_) => StatusCode::NOT_FOUND,

            Self::EmbeddingFailed(_) => StatusCode::SERVICE_UNAVAILABLE,

            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,

            Self::ExtractionFailed(_)
            | Self::IndexInconsistency(_)
            | Self::StorageError(_)
            | Self::SerializationError(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get detailed error message
    pub fn message(&self) -> String {
        match self {
            Self::InvalidThought { field, reason } => {
                format!("Invalid thought payload for field '{field}': {reason}")
            }
            Self::AccessDenied(msg) => format!("Access denied: {msg}"),
            Self::NotFound(id) => format!("Thought not found: {id}"),
            Self::EmbeddingFailed(msg) => format!("Embedding failed: {msg}"),
            Self::ExtractionFailed(msg) => format!("Entity extraction failed: {msg}"),
            Self::DeadlineExceeded => "Lookup deadline exceeded".to_string(),
            Self::IndexInconsistency(msg) => format!("Index inconsistency: {msg}"),
            Self::StorageError(msg) => format!("Storage error: {msg}"),
            Self::SerializationError(msg) => format!("Serialization error: {msg}"),
            Self::Internal(err) => format!("Internal error: {err}"),
        }
    }

    /// Convert to structured error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.message(),
            details: None,
        }
    }
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ArchiveError {}

impl From<anyhow::Error> for ArchiveError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

impl IntoResponse for ArchiveError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.to_response();

        (status, Json(body)).into_response()
    }
}

/// Type alias for Results using ArchiveError
pub type Result<T> = std::result::Result<T, ArchiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ArchiveError::invalid("ttl_seconds", "must be >= 1").code(),
            "INVALID_THOUGHT"
        );
        assert_eq!(ArchiveError::NotFound("123".to_string()).code(), "NOT_FOUND");
        assert_eq!(ArchiveError::DeadlineExceeded.code(), "DEADLINE_EXCEEDED");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ArchiveError::invalid("scope", "bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ArchiveError::AccessDenied("wrong scope".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ArchiveError::IndexInconsistency("vector missing".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_serialization() {
        let err = ArchiveError::AccessDenied("dept_rnd".to_string());
        let response = err.to_response();

        assert_eq!(response.code, "ACCESS_DENIED");
        assert!(response.message.contains("dept_rnd"));
    }
}
