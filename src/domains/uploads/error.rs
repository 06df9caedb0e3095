//! Upload error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Errors that can occur while accepting an upload.
///
/// Each variant maps to a JSON body of the form `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Missing or wrong `X-Upload-Token`.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("No file to upload")]
    NoFile,

    /// Raw uploads without a `name` parameter or `X-Upload-Filename`.
    #[error("Missing file name")]
    MissingName,

    /// Empty name, or an extension outside the allow list.
    #[error("No selected file or file type not allowed")]
    FileTypeNotAllowed,

    #[error("File too large")]
    TooLarge { limit: u64 },

    #[error("Invalid directory path")]
    InvalidDirectory,

    #[error("Invalid multipart payload")]
    InvalidPayload(String),

    /// Writing the file failed.
    #[error("Internal server error")]
    Storage(#[from] std::io::Error),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        match &self {
            Self::Storage(e) => error!("Upload failed: {}", e),
            Self::InvalidPayload(detail) => error!("Multipart parsing error: {}", detail),
            _ => {}
        }

        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
