//! Building full, partial and multipart responses for a resource.

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::Response;
use chrono::{DateTime, Utc};
use futures::{Stream, TryStreamExt};
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::RangeError;
use super::parser::{ByteRange, RangeSet};
use super::stream::{ByteSource, CHUNK_SIZE, multipart_chunks, range_chunks};

/// Snapshot of a resource taken when a request starts being handled.
///
/// The file is not locked; if it changes underneath us the stream fails
/// with an I/O error instead of serving inconsistent data silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub path: PathBuf,
    pub size: u64,
    pub mime_type: String,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ResourceDescriptor {
    pub fn new(path: impl Into<PathBuf>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size,
            mime_type: mime_type.into(),
            last_modified: None,
        }
    }

    /// Build a descriptor from file metadata, guessing the MIME type from
    /// the extension.
    pub fn from_metadata(path: impl Into<PathBuf>, metadata: &std::fs::Metadata) -> Self {
        let path = path.into();
        let mime_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Self {
            size: metadata.len(),
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            mime_type,
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path segment, used for `Content-Disposition`.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("download")
    }

    /// `Last-Modified` value in IMF-fixdate form.
    pub fn http_date(&self) -> Option<String> {
        self.last_modified
            .map(|ts| ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
    }
}

/// The shape of the response chosen for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeResponse {
    /// No `Range` header: the whole resource with status 200.
    Full,
    /// Exactly one satisfiable range.
    Partial(ByteRange),
    /// Several disjoint ranges sent as `multipart/byteranges`.
    Multipart { ranges: RangeSet, boundary: String },
    /// Malformed header or nothing satisfiable.
    Unsatisfiable,
}

impl RangeResponse {
    /// Pick the response shape for an optional, already parsed `Range` header.
    pub fn from_request(ranges: Option<Result<RangeSet, RangeError>>) -> Self {
        match ranges {
            None => Self::Full,
            Some(Err(err)) => {
                debug!("Rejecting range request: {}", err);
                Self::Unsatisfiable
            }
            Some(Ok(set)) => match set.len() {
                0 => Self::Unsatisfiable,
                1 => set.first().map_or(Self::Unsatisfiable, Self::Partial),
                _ => Self::Multipart {
                    ranges: set,
                    boundary: generate_boundary(),
                },
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Full => StatusCode::OK,
            Self::Partial(_) | Self::Multipart { .. } => StatusCode::PARTIAL_CONTENT,
            Self::Unsatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
        }
    }
}

/// Random multipart boundary drawn from the operating system's CSPRNG.
pub fn generate_boundary() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);

    let mut boundary = String::with_capacity(6 + bytes.len() * 2);
    boundary.push_str("range_");
    for byte in bytes {
        let _ = write!(boundary, "{byte:02x}");
    }
    boundary
}

/// Turns a resource and an optional range request into a streamed response.
#[derive(Debug, Clone, Copy)]
pub struct RangeResponder {
    chunk_size: usize,
}

impl Default for RangeResponder {
    fn default() -> Self {
        Self::new(CHUNK_SIZE)
    }
}

impl RangeResponder {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Respond with the whole resource, one range, several ranges, or 416.
    pub fn respond<S: ByteSource>(
        &self,
        resource: &ResourceDescriptor,
        source: S,
        ranges: Option<Result<RangeSet, RangeError>>,
    ) -> Result<Response, http::Error> {
        self.render(resource, source, RangeResponse::from_request(ranges))
    }

    /// Build the response for an already chosen [`RangeResponse`].
    pub fn render<S: ByteSource>(
        &self,
        resource: &ResourceDescriptor,
        source: S,
        plan: RangeResponse,
    ) -> Result<Response, http::Error> {
        let source = Arc::new(source);
        let size = resource.size;

        let mut builder = Response::builder()
            .status(plan.status())
            .header(header::ACCEPT_RANGES, "bytes");
        if let Some(date) = resource.http_date() {
            builder = builder.header(header::LAST_MODIFIED, date);
        }

        match plan {
            RangeResponse::Full => {
                let body = match ByteRange::whole(size) {
                    Some(range) => {
                        logged_body(range_chunks(source, range, self.chunk_size), resource)
                    }
                    None => Body::empty(),
                };
                builder
                    .header(header::CONTENT_TYPE, resource.mime_type.as_str())
                    .header(header::CONTENT_LENGTH, size.to_string())
                    .body(body)
            }
            RangeResponse::Partial(range) => builder
                .header(header::CONTENT_TYPE, resource.mime_type.as_str())
                .header(header::CONTENT_RANGE, range.content_range(size))
                .header(header::CONTENT_LENGTH, range.len().to_string())
                .body(logged_body(
                    range_chunks(source, range, self.chunk_size),
                    resource,
                )),
            RangeResponse::Multipart { ranges, boundary } => {
                let content_type = format!("multipart/byteranges; boundary={boundary}");
                let body = multipart_chunks(
                    source,
                    ranges,
                    boundary,
                    resource.mime_type.clone(),
                    size,
                    self.chunk_size,
                );
                builder
                    .header(header::CONTENT_TYPE, content_type)
                    .body(logged_body(body, resource))
            }
            RangeResponse::Unsatisfiable => builder
                .header(header::CONTENT_RANGE, format!("bytes */{size}"))
                .body(Body::empty()),
        }
    }
}

/// Wrap a chunk stream so that a mid-stream fault is logged before hyper
/// aborts the connection.
fn logged_body<St>(stream: St, resource: &ResourceDescriptor) -> Body
where
    St: Stream<Item = io::Result<bytes::Bytes>> + Send + 'static,
{
    let path = resource.path.display().to_string();
    Body::from_stream(stream.inspect_err(move |err| {
        warn!(path = %path, "Aborting response body: {}", err);
    }))
}
