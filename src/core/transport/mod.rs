//! Transport layer for the file server.
//!
//! The server is exposed over plain HTTP through axum. This module owns the
//! listener configuration, the router and the middleware stack, and hands
//! each request to the domain handlers.

mod config;
mod error;
pub mod headers;
pub mod http;

pub use config::HttpConfig;
pub use error::{TransportError, TransportResult};
pub use http::HttpTransport;
