//! Storage Error Types
//!
//! Built on `exn`, so every error carries the location it was raised at and
//! can be wrapped by callers without losing its kind.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Why a library could not be listed or a book could not be read.
///
/// Paths are relative to the library root wherever the backend knows them,
/// so they can be shown to users without exposing the mount point.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Anything else the operating system complained about. Often transient
    /// on network mounts.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Relative paths only, and never above the library root.
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// The walk turned up something that isn't inside the library root.
    #[display("outside of the library root: {}", _0.display())]
    OutsideRoot(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        let hobbit = PathBuf::from("Tolkien/The Hobbit.epub");
        assert_eq!(ErrorKind::NotFound(hobbit.clone()).to_string(), "not found: Tolkien/The Hobbit.epub");
        assert_eq!(ErrorKind::InvalidPath(PathBuf::from("../x")).to_string(), "invalid path: ../x");
        assert_eq!(ErrorKind::OutsideRoot(PathBuf::from("/mnt/other")).to_string(), "outside of the library root: /mnt/other");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Io(IoError::other("stale NFS handle")).is_retryable());
        assert!(!ErrorKind::NotFound(PathBuf::from("Dune.epub")).is_retryable());
        assert!(!ErrorKind::PermissionDenied(PathBuf::from("Dune.epub")).is_retryable());
    }
}
