//! Error types and handling for the file server.
//!
//! This module defines a unified error type that can represent errors from
//! all domains and external dependencies, and maps each of them onto the
//! HTTP response a client should see.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error};

/// Body of every 404 response, whether the path is missing or denied.
pub const NOT_FOUND_MESSAGE: &str = "Files or Directory not found or missing";

/// A specialized Result type for file server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the file server.
#[derive(Debug, Error)]
pub enum Error {
    /// Error originating from the uploads domain.
    #[error("Upload error: {0}")]
    Upload(#[from] crate::domains::uploads::UploadError),

    /// A request path was rejected by the path guard.
    #[error("Path rejected: {0}")]
    Path(#[from] crate::core::security::PathSecurityError),

    /// The path resolved fine but nothing servable is there.
    #[error("Not found")]
    NotFound,

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors from file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure while assembling an HTTP response.
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// JSON serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server errors that should not occur under normal operation.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error should be reported as a plain 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Path(_) | Self::NotFound => true,
            Self::Io(err) => is_not_found_io(err),
            _ => false,
        }
    }
}

/// I/O failures that mean "there is nothing for you here".
fn is_not_found_io(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::NotFound
            | std::io::ErrorKind::PermissionDenied
            | std::io::ErrorKind::NotADirectory
            | std::io::ErrorKind::InvalidInput
            | std::io::ErrorKind::InvalidFilename
    )
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.is_not_found() {
            debug!("Responding 404: {}", self);
            return (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE).into_response();
        }

        match self {
            Self::Upload(err) => err.into_response(),
            other => {
                error!("Request failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::security::PathSecurityError;
    use axum::body::to_bytes;
    use std::path::PathBuf;

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_denied_and_missing_look_identical() {
        let denied = Error::from(PathSecurityError::Denied {
            path: PathBuf::from("/srv/private"),
        })
        .into_response();
        let missing = Error::from(std::io::Error::from(std::io::ErrorKind::NotFound)).into_response();

        assert_eq!(denied.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(denied.headers(), missing.headers());
        assert_eq!(body_text(denied).await, body_text(missing).await);
    }

    #[tokio::test]
    async fn test_invalid_path_input_is_404() {
        for kind in [
            std::io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidFilename,
        ] {
            let response = Error::from(std::io::Error::from(kind)).into_response();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(body_text(response).await, NOT_FOUND_MESSAGE);
        }
    }

    #[test]
    fn test_other_errors_are_internal() {
        let response = Error::internal("boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response =
            Error::from(std::io::Error::other("disk on fire")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
