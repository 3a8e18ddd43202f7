//! Why a book's metadata couldn't be read.
//!
//! None of these are worth retrying: the same bytes will fail the same way.

use derive_more::{Display, Error};

use crate::BookFormat;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Every kind leaves the book with its filename-derived title and author.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// There is no parser for this kind of file.
    #[display("unsupported book format: {_0}")]
    UnsupportedFormat(#[error(not(source))] BookFormat),
    /// A format name could not be recognised.
    #[display("unknown book format: {_0}")]
    UnknownFormat(#[error(not(source))] String),
    /// The file is too broken to process.
    #[display("malformed {format} file: {reason}")]
    Malformed {
        /// The format the file claimed to be.
        format: BookFormat,
        /// Details from the underlying parser.
        reason: String,
    },
    /// The file parsed, but carried neither a title nor an author.
    #[display("no metadata found in {_0} file")]
    NoMetadata(#[error(not(source))] BookFormat),
}

impl ErrorKind {
    pub(crate) fn malformed(format: BookFormat, reason: impl ToString) -> Self {
        Self::Malformed {
            format,
            reason: reason.to_string(),
        }
    }

    /// Always `false`, kept for parity with the other crates' error kinds.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
