//! Directory listing responses.

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use std::path::Path;
use tracing::debug;

use super::entries::read_entries;
use super::render::{JsonListing, render_html};
use crate::core::error::Result;
use crate::core::server::FileServer;
use crate::core::transport::headers::{build_base_url, host_header};

/// Header sent by the command line client to ask for JSON listings.
pub const CLIENT_HEADER: &str = "x-serve-client";

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(CLIENT_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("serve-cli"))
}

/// Render the listing of `directory` as HTML, or as JSON for the CLI client.
pub async fn render_directory(
    server: &FileServer,
    headers: &HeaderMap,
    requested: &str,
    directory: &Path,
) -> Result<Response> {
    let entries = read_entries(server.guard(), directory).await?;
    debug!("Listing {} ({} entries)", directory.display(), entries.len());

    if wants_json(headers) {
        let listing = JsonListing::new(requested, &build_base_url(headers), &entries);
        let body = serde_json::to_vec(&listing)?;
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(Body::from(body))?);
    }

    let page = render_html(requested, &host_header(headers), &entries);
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Body::from(page))?)
}
