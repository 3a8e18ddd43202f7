pub mod error;
mod format;
mod parse;

use tracing::instrument;

use crate::error::{ErrorKind, Result};
pub use crate::format::BookFormat;

/// Whatever descriptive metadata could be recovered from a book's contents.
///
/// Both fields are trimmed and never empty; a value that was blank in the
/// file is reported as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtractedMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Easy, top-level entrypoint for the extraction of [`ExtractedMetadata`]
/// from the raw bytes of a book file.
///
/// Dispatches on `format`, which callers determine from the file extension
/// (see [`BookFormat::from_path`]). This is synchronous and potentially
/// slow for large files; async callers should run it on a blocking thread.
///
/// # Errors
///
/// - [`UnsupportedFormat`](ErrorKind::UnsupportedFormat) for
///   [`BookFormat::Unknown`],
/// - [`Malformed`](ErrorKind::Malformed) when the container cannot be parsed,
/// - [`NoMetadata`](ErrorKind::NoMetadata) when the file parsed but carried
///   neither a title nor an author.
#[instrument(skip(bytes), fields(size = bytes.len(), %format))]
pub fn extract(bytes: &[u8], format: BookFormat) -> Result<ExtractedMetadata> {
    let raw = match format {
        BookFormat::Epub => parse::epub(bytes)?,
        BookFormat::Pdf => parse::pdf(bytes)?,
        BookFormat::Mobi => parse::mobi(bytes)?,
        BookFormat::Unknown => exn::bail!(ErrorKind::UnsupportedFormat(format)),
    };
    let metadata = ExtractedMetadata {
        title: clean(raw.title),
        author: clean(raw.author),
    };
    if metadata.title.is_none() && metadata.author.is_none() {
        exn::bail!(ErrorKind::NoMetadata(format));
    }
    Ok(metadata)
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim_matches(|c: char| c.is_whitespace() || c == '\0').to_string()).filter(|v| !v.is_empty())
}
