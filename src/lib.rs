//! Static file server with byte-range support.
//!
//! Serves a directory tree over HTTP. Every request path passes through a
//! [`PathGuard`](core::PathGuard) before anything on disk is touched, and
//! file bodies are streamed in bounded chunks with full support for single
//! and multiple `Range` requests.
//!
//! # Architecture
//!
//! - **core**: configuration, error handling, path security, server state
//!   and the axum transport
//! - **domains**: request handling organized by concern
//!   - **ranges**: `Range` parsing and full/partial/multipart responses
//!   - **listing**: directory pages and their JSON form
//!   - **uploads**: token protected multipart and raw-body uploads
//!
//! # Example
//!
//! ```rust,no_run
//! use serve::core::{Config, FileServer, HttpTransport};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let transport = HttpTransport::new(config.transport.clone());
//!     let server = FileServer::new(config)?;
//!     transport.run(server).await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{Config, Error, FileServer, PathGuard, Result};
