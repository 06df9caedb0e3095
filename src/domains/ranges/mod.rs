//! Ranges domain module.
//!
//! Everything needed to serve a file body: parsing the `Range` header,
//! choosing between a full, single-range or multipart response, and streaming
//! the bytes in bounded chunks.
//!
//! ## Architecture
//!
//! - `parser.rs` - `Range` header grammar, `ByteRange` and `RangeSet`
//! - `stream.rs` - `ByteSource` trait and the lazy chunk streams
//! - `responder.rs` - `RangeResponder`, which builds the HTTP response
//! - `handlers.rs` - glue used by the HTTP layer to serve a file on disk

mod error;
mod handlers;
mod parser;
mod responder;
mod stream;

#[cfg(test)]
mod test_support;

pub use error::RangeError;
pub use handlers::serve_file;
pub use parser::{ByteRange, RangeSet};
pub use responder::{RangeResponder, RangeResponse, ResourceDescriptor, generate_boundary};
pub use stream::{
    ByteSource, CHUNK_SIZE, FileSource, closing_delimiter, multipart_chunks, part_header,
    range_chunks,
};
