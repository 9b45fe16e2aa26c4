//! Image resolution errors.

use thiserror::Error;

/// Why an image variant could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The message has no record for the requested variant.
    #[error("No such image variant on this message")]
    NotFound,

    /// No usable local copy; a remote fetch is needed.
    ///
    /// Covers a missing path as well as a local file that could not be read
    /// or decoded.
    #[error("Image is not cached locally")]
    NotCached,

    /// Bytes were retrieved but are not a valid image.
    #[error("Image decode failed: {0}")]
    DecodeFailed(String),

    /// The transport could not retrieve the bytes.
    #[error("Image fetch failed: {0}")]
    FetchFailed(String),
}

impl ResolveError {
    /// Whether the caller should start a remote fetch.
    #[must_use]
    pub const fn needs_fetch(&self) -> bool {
        matches!(self, Self::NotCached)
    }
}
