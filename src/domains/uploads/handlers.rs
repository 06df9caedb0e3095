//! `POST /upload` and `POST /upload-stream` handlers.

use axum::Json;
use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::error::UploadError;
use super::filename::{is_allowed_file, secure_filename};
use crate::core::security::PathGuard;
use crate::core::server::FileServer;
use crate::core::transport::headers::{build_base_url, client_ip, client_user_agent};

/// Header carrying the shared upload secret.
pub const TOKEN_HEADER: &str = "x-upload-token";

/// Header that may override the target directory.
pub const PATH_HEADER: &str = "x-upload-path";

/// File name of a raw upload when the `name` parameter is absent.
pub const FILENAME_HEADER: &str = "x-upload-filename";

/// Accepts names without an extension when set to `1`, `true` or `yes`.
pub const ALLOW_NO_EXT_HEADER: &str = "x-allow-no-ext";

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    /// Target directory, relative to the served root.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadStreamQuery {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub allow_no_ext: Option<bool>,
}

/// Success body returned after a file has been stored.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: String,
    pub name: String,
    pub path: String,
    pub size: u64,
    pub download: String,
    pub view: String,
}

/// Accept one multipart `file` field and store it under the target
/// directory.
///
/// The token is checked before the body is looked at. The target directory
/// comes from `X-Upload-Path`, a `path` form field, or the `path` query
/// parameter, in that order of precedence.
pub async fn handle_upload(
    State(server): State<FileServer>,
    headers: HeaderMap,
    Query(query): Query<UploadQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, UploadError> {
    check_token(&server, &headers)?;

    let mut multipart = multipart.map_err(|e| UploadError::InvalidPayload(e.body_text()))?;

    let header_dir = header_text(&headers, PATH_HEADER);
    let mut target_dir = query.path.unwrap_or_default();

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| UploadError::InvalidPayload(e.body_text()))?;
        let Some(field) = field else {
            return Err(UploadError::NoFile);
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("path") => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| UploadError::InvalidDirectory)?;
                if !text.trim().is_empty() {
                    target_dir = text.trim().to_string();
                }
            }
            Some("file") => {
                let dir = header_dir.as_deref().unwrap_or(&target_dir);
                let original = field.file_name().unwrap_or_default().to_string();
                let allow_no_ext = allow_no_ext(&headers).unwrap_or(false);

                let target = prepare_target(&server, dir, &original, allow_no_ext).await?;
                let chunks = field.map_err(|e| UploadError::InvalidPayload(e.body_text()));
                let size = write_upload(chunks, &target, server.config().uploads.max_file_size)
                    .await?;
                return Ok(stored(&server, &headers, target, size));
            }
            _ => {}
        }
    }
}

/// Store the raw request body as one file.
///
/// The name comes from the `name` query parameter or `X-Upload-Filename`;
/// the directory from `X-Upload-Path` or the `path` parameter.
pub async fn handle_upload_stream(
    State(server): State<FileServer>,
    headers: HeaderMap,
    Query(query): Query<UploadStreamQuery>,
    body: Body,
) -> Result<Response, UploadError> {
    check_token(&server, &headers)?;

    let dir = header_text(&headers, PATH_HEADER)
        .or(query.path)
        .unwrap_or_default();
    let original = query
        .name
        .filter(|name| !name.trim().is_empty())
        .or_else(|| header_text(&headers, FILENAME_HEADER))
        .ok_or(UploadError::MissingName)?;
    let allow_no_ext = allow_no_ext(&headers)
        .or(query.allow_no_ext)
        .unwrap_or(false);

    let target = prepare_target(&server, &dir, &original, allow_no_ext).await?;
    let chunks = body
        .into_data_stream()
        .map_err(|e| UploadError::InvalidPayload(e.to_string()));
    let size = write_upload(chunks, &target, server.config().uploads.max_file_size).await?;

    Ok(stored(&server, &headers, target, size))
}

fn check_token(server: &FileServer, headers: &HeaderMap) -> Result<(), UploadError> {
    let provided = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
    if provided != Some(server.config().uploads.token.as_str()) {
        warn!("Rejected upload from {}: bad token", client_ip(headers));
        return Err(UploadError::Unauthorized);
    }
    Ok(())
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `Some` whenever the header is present, so it can override a query flag.
fn allow_no_ext(headers: &HeaderMap) -> Option<bool> {
    let value = headers.get(ALLOW_NO_EXT_HEADER)?.to_str().ok()?;
    Some(matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    ))
}

/// Checked location an upload will be written to.
#[derive(Debug)]
struct UploadTarget {
    name: String,
    destination: PathBuf,
}

/// Validate the file name and directory and create the directory.
async fn prepare_target(
    server: &FileServer,
    dir: &str,
    original: &str,
    allow_no_ext: bool,
) -> Result<UploadTarget, UploadError> {
    let guard = server.guard();

    if original.trim().is_empty() {
        return Err(UploadError::FileTypeNotAllowed);
    }
    let name = secure_filename(original).ok_or(UploadError::FileTypeNotAllowed)?;
    let extensionless = Path::new(&name).extension().is_none();
    if !is_allowed_file(&name, &server.config().uploads.allowed_extensions)
        && !(allow_no_ext && extensionless)
    {
        return Err(UploadError::FileTypeNotAllowed);
    }

    let directory = guard
        .resolve(dir)
        .map_err(|_| UploadError::InvalidDirectory)?;
    confirm_existing_ancestor(guard, &directory).await?;
    tokio::fs::create_dir_all(&directory).await?;
    let directory = guard
        .confirm(directory)
        .await
        .map_err(|_| UploadError::InvalidDirectory)?;

    let destination = directory.join(&name);
    if guard.is_denied(&destination) {
        return Err(UploadError::FileTypeNotAllowed);
    }

    Ok(UploadTarget { name, destination })
}

/// In strict mode, the deepest existing part of `directory` must resolve
/// inside the root before anything is created below it.
async fn confirm_existing_ancestor(
    guard: &PathGuard,
    directory: &Path,
) -> Result<(), UploadError> {
    if !guard.resolves_symlinks() {
        return Ok(());
    }

    for ancestor in directory.ancestors() {
        if tokio::fs::symlink_metadata(ancestor).await.is_ok() {
            guard
                .confirm(ancestor.to_path_buf())
                .await
                .map_err(|_| UploadError::InvalidDirectory)?;
            break;
        }
    }
    Ok(())
}

/// Stream `chunks` into a fresh staging file next to the destination, then
/// rename it into place.
///
/// The staging file is created exclusively and the rename replaces whatever
/// sits at the destination, so an existing symlink there is never written
/// through. The staging file is removed on failure.
async fn write_upload<S>(
    chunks: S,
    target: &UploadTarget,
    limit: u64,
) -> Result<u64, UploadError>
where
    S: Stream<Item = Result<Bytes, UploadError>>,
{
    let staging = target
        .destination
        .with_file_name(format!(".{}.{:016x}.part", target.name, OsRng.next_u64()));

    let mut output = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&staging)
        .await?;
    let copied = copy_chunks(chunks, &mut output, limit).await;
    drop(output);

    let result = match copied {
        Ok(written) => tokio::fs::rename(&staging, &target.destination)
            .await
            .map(|()| written)
            .map_err(UploadError::from),
        Err(e) => Err(e),
    };

    if result.is_err() {
        remove_partial(staging).await;
    }
    result
}

async fn copy_chunks<S>(
    chunks: S,
    output: &mut tokio::fs::File,
    limit: u64,
) -> Result<u64, UploadError>
where
    S: Stream<Item = Result<Bytes, UploadError>>,
{
    let mut chunks = std::pin::pin!(chunks);
    let mut written = 0u64;

    while let Some(chunk) = chunks.try_next().await? {
        written += chunk.len() as u64;
        if written > limit {
            return Err(UploadError::TooLarge { limit });
        }
        output.write_all(&chunk).await?;
    }

    output.flush().await?;
    Ok(written)
}

async fn remove_partial(path: PathBuf) {
    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!("Failed to remove partial upload {}: {}", path.display(), e);
    }
}

/// Log the upload and build the success body.
fn stored(server: &FileServer, headers: &HeaderMap, target: UploadTarget, size: u64) -> Response {
    let UploadTarget { name, destination } = target;
    let relative = server
        .guard()
        .relative_path(&destination)
        .unwrap_or_else(|| name.clone());
    let base_url = build_base_url(headers);

    info!(
        "[uploading] {} - {} - /{} - {}",
        client_ip(headers),
        name,
        relative,
        client_user_agent(headers)
    );

    Json(UploadResponse {
        success: format!("File uploaded to {relative}"),
        download: format!("{base_url}{relative}"),
        view: format!("{base_url}{relative}?view=true"),
        name,
        path: relative,
        size,
    })
    .into_response()
}
