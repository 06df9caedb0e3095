//! Listing domain module.
//!
//! Renders the visible contents of a directory, either as an HTML page for
//! browsers or as JSON for the command line client.
//!
//! ## Architecture
//!
//! - `entries.rs` - reading and filtering directory entries
//! - `render.rs` - HTML page and JSON payload
//! - `handlers.rs` - response building used by the HTTP layer

mod entries;
mod handlers;
mod render;

pub use entries::{DirectoryEntry, read_entries};
pub use handlers::{CLIENT_HEADER, render_directory};
pub use render::{
    JsonEntry, JsonListing, directory_label, encode_link, format_modified, format_size,
    parent_link, render_html,
};
