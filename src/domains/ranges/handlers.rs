//! Serving a file on disk through the range responder.

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::Response;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::path::PathBuf;
use tracing::info;

use super::error::RangeError;
use super::parser::RangeSet;
use super::responder::ResourceDescriptor;
use super::stream::FileSource;
use crate::core::error::Result;
use crate::core::server::FileServer;
use crate::core::transport::headers::{client_ip, client_user_agent};

/// Stream `full_path` to the client, honouring any `Range` header.
///
/// `view` switches `Content-Disposition` from `attachment` to `inline`.
pub async fn serve_file(
    server: &FileServer,
    headers: &HeaderMap,
    requested: &str,
    full_path: PathBuf,
    metadata: &std::fs::Metadata,
    view: bool,
) -> Result<Response> {
    // An unreadable file must fail here, before a 200 has been committed.
    drop(tokio::fs::File::open(&full_path).await?);

    let resource = ResourceDescriptor::from_metadata(full_path, metadata);
    let ranges = requested_ranges(headers, resource.size);
    let source = FileSource::new(resource.path());

    let mut response = server.responder().respond(&resource, source, ranges)?;

    if response.status() != StatusCode::RANGE_NOT_SATISFIABLE {
        response.headers_mut().insert(
            header::CONTENT_DISPOSITION,
            content_disposition(resource.file_name(), view),
        );
    }

    info!(
        "[downloading] {} - {} - /{} - {}",
        client_ip(headers),
        resource.file_name(),
        requested.trim_start_matches('/'),
        client_user_agent(headers)
    );

    Ok(response)
}

/// Parse the `Range` header, if any. A value that is not valid text counts
/// as malformed.
fn requested_ranges(
    headers: &HeaderMap,
    size: u64,
) -> Option<std::result::Result<RangeSet, RangeError>> {
    let value = headers.get(header::RANGE)?;
    Some(match value.to_str() {
        Ok(text) => RangeSet::parse_satisfiable(text, size),
        Err(_) => Err(RangeError::malformed(size, "header is not valid text")),
    })
}

/// `attachment` or `inline` disposition carrying the file name.
///
/// Non-ASCII names get an RFC 5987 `filename*` next to an ASCII fallback.
fn content_disposition(file_name: &str, view: bool) -> HeaderValue {
    let kind = if view { "inline" } else { "attachment" };

    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    let value = if file_name.is_ascii() {
        format!(r#"{kind}; filename="{fallback}""#)
    } else {
        let encoded = utf8_percent_encode(file_name, NON_ALPHANUMERIC);
        format!(r#"{kind}; filename="{fallback}"; filename*=UTF-8''{encoded}"#)
    };

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
