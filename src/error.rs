//! Error types for catrees.

use thiserror::Error;

/// Result type alias for catrees operations
pub type Result<T> = std::result::Result<T, CatreesError>;

/// Errors surfaced by the clustering, ranking and fetching layers.
///
/// Malformed observation records are never errors: they are skipped where
/// they are found. Everything here is either a caller mistake
/// (`InvalidArgument`) or a failure talking to the observation source.
#[derive(Debug, Error)]
pub enum CatreesError {
    /// A parameter was outside its valid domain (grid size, radius, page size)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Transport or decoding failure from the HTTP client
    #[cfg(feature = "http")]
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// The observation API answered with a non-success status
    #[cfg(feature = "http")]
    #[error("API returned {status} for {url}")]
    Api { status: u16, url: String },

    /// IO error (runtime construction, seen-set files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatreesError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
