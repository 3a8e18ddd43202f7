//! Failures of the catalog engine.
//!
//! Kinds are `Clone` so that callers coalesced onto somebody else's scan can
//! be handed the same outcome.

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a catalog failure.
///
/// ### Operational Errors
/// - [`ErrorKind::Scan`]
/// - [`ErrorKind::NotFound`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Storage`]
/// - [`ErrorKind::Extract`]
/// - [`ErrorKind::Timeout`]
/// - [`ErrorKind::Persist`]
/// - [`ErrorKind::InvalidCache`]
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Listing the library failed; the previous catalog (if any) is still current.
    #[display("library scan failed: {}", _0.display())]
    Scan(#[error(not(source))] PathBuf),
    /// A storage backend read failed.
    #[display("storage error")]
    Storage,
    /// Metadata could not be extracted from a book file.
    #[display("metadata extraction failed")]
    Extract,
    /// Metadata extraction took longer than allowed.
    #[display("metadata extraction timed out")]
    Timeout,
    /// Writing the cache file failed.
    #[display("failed to persist catalog to {}", _0.display())]
    Persist(#[error(not(source))] PathBuf),
    /// The cache file exists but cannot be used.
    #[display("cache file rejected: {_0}")]
    InvalidCache(#[error(not(source))] String),
    /// No book with this identifier exists in the current catalog.
    #[display("book not found: {_0}")]
    NotFound(#[error(not(source))] String),
}

impl ErrorKind {
    /// A later scan or refresh could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Scan(_) | Self::Storage | Self::Timeout | Self::Persist(_))
    }
}
