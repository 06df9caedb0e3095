//! Range-specific error types.

use thiserror::Error;

/// Errors that can occur while interpreting a `Range` request header.
///
/// Both variants are answered with `416 Range Not Satisfiable`, but they are
/// kept apart so callers and tests can tell a broken header from one that
/// simply asks for bytes the resource does not have.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// The header does not follow the `bytes=<spec>` grammar.
    #[error("Malformed range syntax: {reason}")]
    MalformedRangeSyntax { size: u64, reason: &'static str },

    /// Every sub-range was discarded during validation.
    #[error("Range not satisfiable for a resource of {size} bytes")]
    UnsatisfiableRange { size: u64 },
}

impl RangeError {
    /// Create a new "malformed" error.
    pub fn malformed(size: u64, reason: &'static str) -> Self {
        Self::MalformedRangeSyntax { size, reason }
    }

    /// Create a new "unsatisfiable" error.
    pub fn unsatisfiable(size: u64) -> Self {
        Self::UnsatisfiableRange { size }
    }

    /// Size of the resource the header was evaluated against.
    pub fn resource_size(&self) -> u64 {
        match self {
            Self::MalformedRangeSyntax { size, .. } | Self::UnsatisfiableRange { size } => *size,
        }
    }

    /// Value of the `Content-Range` header sent with the 416 response.
    pub fn content_range(&self) -> String {
        format!("bytes */{}", self.resource_size())
    }
}
