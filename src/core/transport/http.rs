//! HTTP transport implementation.
//!
//! Builds the axum router for the file server and runs it on a TCP
//! listener. `GET` requests for directories render a listing, `GET`
//! requests for files go through the range responder, and `POST /upload`
//! and `POST /upload-stream` accept multipart and raw-body uploads.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{Extensions, HeaderMap, StatusCode, Version, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::compression::predicate::{DefaultPredicate, Predicate};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use super::{HttpConfig, TransportError, TransportResult};
use crate::core::error::{Error, Result};
use crate::core::server::FileServer;
use crate::domains::{listing, ranges, uploads};

/// HTTP transport handler.
pub struct HttpTransport {
    config: HttpConfig,
}

/// Query string accepted on file and directory routes.
#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    /// Serve files inline instead of as an attachment.
    #[serde(default)]
    pub view: Option<bool>,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given config.
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }

    /// Get the bind address.
    pub fn address(&self) -> String {
        self.config.address()
    }

    /// Build the application router for `server`.
    pub fn router(server: FileServer) -> Router {
        let enable_cors = server.config().transport.enable_cors;

        let mut app = Router::new()
            .route("/health", get(health_check))
            .route("/", get(root_handler))
            .route("/{*path}", get(path_handler))
            .route(
                "/upload",
                post(uploads::handle_upload).layer(DefaultBodyLimit::disable()),
            )
            .route(
                "/upload-stream",
                post(uploads::handle_upload_stream).layer(DefaultBodyLimit::disable()),
            )
            .with_state(server)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(
                        CompressionLayer::new()
                            .compress_when(DefaultPredicate::new().and(is_html)),
                    ),
            );

        // Add CORS if enabled
        if enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers([
                    header::ACCEPT_RANGES,
                    header::CONTENT_RANGE,
                    header::CONTENT_LENGTH,
                    header::CONTENT_DISPOSITION,
                ]);
            app = app.layer(cors);
        }

        app
    }

    /// Run the HTTP transport until Ctrl-C.
    pub async fn run(self, server: FileServer) -> TransportResult<()> {
        let addr = self.address();
        let app = Self::router(server);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TransportError::bind(&addr, e))?;

        info!("Ready - listening on {}", self.config.description());
        info!("  → Files:  GET /{{path}}");
        info!("  → Upload: POST /upload?path=<dir>");
        info!("  → Upload: POST /upload-stream?path=<dir>&name=<file>");
        info!("  → Health: GET /health");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| TransportError::http(e.to_string()))?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Only directory listings are compressed; file bodies and ranges are
/// sent as stored.
fn is_html(_: StatusCode, _: Version, headers: &HeaderMap, _: &Extensions) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/html"))
}

/// Health check endpoint.
async fn health_check(State(server): State<FileServer>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "name": server.name(),
        "version": server.version(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn root_handler(
    State(server): State<FileServer>,
    headers: HeaderMap,
    Query(query): Query<ViewQuery>,
) -> Result<Response> {
    serve_path(&server, &headers, "", &query).await
}

async fn path_handler(
    State(server): State<FileServer>,
    Path(path): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ViewQuery>,
) -> Result<Response> {
    serve_path(&server, &headers, &path, &query).await
}

/// Resolve a request path and dispatch to the listing or the file handler.
///
/// Denied, escaping and missing paths all end up as the same 404.
#[instrument(skip(server, headers, query))]
async fn serve_path(
    server: &FileServer,
    headers: &HeaderMap,
    requested: &str,
    query: &ViewQuery,
) -> Result<Response> {
    let full_path = server.guard().resolve(requested)?;
    let full_path = server.guard().confirm(full_path).await?;
    let metadata = tokio::fs::metadata(&full_path).await?;

    if metadata.is_dir() {
        listing::render_directory(server, headers, requested, &full_path).await
    } else if metadata.is_file() {
        ranges::serve_file(
            server,
            headers,
            requested,
            full_path,
            &metadata,
            query.view.unwrap_or(false),
        )
        .await
    } else {
        Err(Error::NotFound)
    }
}
