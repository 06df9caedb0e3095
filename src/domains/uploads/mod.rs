//! Uploads domain module.
//!
//! Token protected multipart and raw-body uploads into the served tree. Target
//! directories go through the same path guard as downloads.

mod error;
mod filename;
mod handlers;

pub use error::UploadError;
pub use filename::{is_allowed_file, secure_filename};
pub use handlers::{
    ALLOW_NO_EXT_HEADER, FILENAME_HEADER, PATH_HEADER, TOKEN_HEADER, UploadQuery, UploadResponse,
    UploadStreamQuery, handle_upload, handle_upload_stream,
};
