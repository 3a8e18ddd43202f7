use dropshelf_extract::{BookFormat, ExtractedMetadata};
use dropshelf_storage::{FileInfo, portable_path};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Placeholder author for entries whose files have not (successfully) been read.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Hex characters of the path hash kept for an identifier.
const ID_LENGTH: usize = 32;

/// Stable identifier of a book, derived from its path relative to the
/// library root. The same relative path always produces the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(String);
impl BookId {
    /// ```
    /// use dropshelf_catalog::BookId;
    /// use std::path::Path;
    ///
    /// let id = BookId::from_path(Path::new("Tolkien/The Hobbit.epub"));
    /// assert_eq!(id.as_str().len(), 32);
    /// assert_eq!(id, BookId::from_path(Path::new("./Tolkien//The Hobbit.epub")));
    /// ```
    pub fn from_path(path: &Path) -> Self {
        let hash = blake3::hash(&portable_path(path)).to_hex();
        Self(hash[..ID_LENGTH].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<String> for BookId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
impl From<&str> for BookId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
impl Display for BookId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// One book file in the catalog.
///
/// Entries are immutable once built; enrichment produces a replacement entry
/// rather than modifying one in place, so no reader can ever observe a
/// half-updated row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookEntry {
    pub id: BookId,
    /// Relative to the library root.
    #[serde(with = "super::os_path")]
    pub path: PathBuf,
    pub format: BookFormat,
    pub size_bytes: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub modified_at: OffsetDateTime,
    pub title: String,
    pub author: String,
    /// Whether content extraction has been attempted for this generation,
    /// regardless of whether it succeeded.
    pub enriched: bool,
}
impl BookEntry {
    /// Build a filename-only entry from a directory listing.
    ///
    /// Returns `None` for files that aren't books.
    pub fn from_file(file: &FileInfo) -> Option<Self> {
        let format = file.extension().map_or(BookFormat::Unknown, |ext| BookFormat::from_extension(&ext));
        if !format.is_supported() {
            return None;
        }
        Some(Self {
            id: BookId::from_path(&file.path),
            path: file.path.clone(),
            format,
            size_bytes: file.size,
            modified_at: file.modified,
            title: title_from_filename(&file.path),
            author: UNKNOWN_AUTHOR.to_string(),
            enriched: false,
        })
    }

    /// The replacement entry after an extraction attempt. A failed attempt
    /// (`None`) keeps the filename-derived fields.
    pub fn enriched_with(&self, metadata: Option<&ExtractedMetadata>) -> Self {
        let mut entry = self.clone();
        if let Some(metadata) = metadata {
            if let Some(title) = metadata.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                entry.title = title.to_string();
            }
            if let Some(author) = metadata.author.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
                entry.author = author.to_string();
            }
        }
        entry.enriched = true;
        entry
    }

    /// Filename to offer when the book is downloaded.
    pub fn filename(&self) -> String {
        self.path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_else(|| self.id.to_string())
    }
}

/// `Tolkien_-_The_Hobbit.epub` becomes `Tolkien - The Hobbit`.
fn title_from_filename(path: &Path) -> String {
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let title = stem.replace('_', " ").split_whitespace().collect::<Vec<_>>().join(" ");
    match title.is_empty() {
        true => path.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default(),
        false => title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::datetime;

    fn file(path: &str) -> FileInfo {
        FileInfo::new(path, 1024, datetime!(2024-01-01 00:00 UTC))
    }

    #[rstest]
    #[case("books/Tolkien - The Hobbit.epub", "Tolkien - The Hobbit")]
    #[case("corrupt.pdf", "corrupt")]
    #[case("Frank_Herbert_-_Dune.mobi", "Frank Herbert - Dune")]
    #[case("a/b/  spaced   out  .epub", "spaced out")]
    #[case("___.pdf", "___.pdf")]
    #[case("archive.tar.pdf", "archive.tar")]
    fn test_title_from_filename(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(title_from_filename(Path::new(path)), expected);
    }

    #[test]
    fn test_from_file() {
        let entry = BookEntry::from_file(&file("books/Tolkien - The Hobbit.epub")).unwrap();
        assert_eq!(entry.id, BookId::from_path(Path::new("books/Tolkien - The Hobbit.epub")));
        assert_eq!(entry.format, BookFormat::Epub);
        assert_eq!(entry.size_bytes, 1024);
        assert_eq!(entry.title, "Tolkien - The Hobbit");
        assert_eq!(entry.author, UNKNOWN_AUTHOR);
        assert!(!entry.enriched);
    }

    #[test]
    fn test_from_file_skips_non_books() {
        assert!(BookEntry::from_file(&file("cover.jpg")).is_none());
        assert!(BookEntry::from_file(&file("README")).is_none());
    }

    #[test]
    fn test_enriched_with_metadata() {
        let entry = BookEntry::from_file(&file("Tolkien - The Hobbit.epub")).unwrap();
        let metadata = ExtractedMetadata {
            title: Some("The Hobbit".to_string()),
            author: Some("J. R. R. Tolkien".to_string()),
        };
        let enriched = entry.enriched_with(Some(&metadata));
        assert_eq!(enriched.title, "The Hobbit");
        assert_eq!(enriched.author, "J. R. R. Tolkien");
        assert!(enriched.enriched);
        // The original entry is untouched.
        assert!(!entry.enriched);
        // Running it again changes nothing.
        assert_eq!(enriched.enriched_with(Some(&metadata)), enriched);
    }

    #[test]
    fn test_enriched_with_partial_metadata() {
        let entry = BookEntry::from_file(&file("Dune.pdf")).unwrap();
        let metadata = ExtractedMetadata {
            title: Some("   ".to_string()),
            author: Some("Frank Herbert".to_string()),
        };
        let enriched = entry.enriched_with(Some(&metadata));
        assert_eq!(enriched.title, "Dune");
        assert_eq!(enriched.author, "Frank Herbert");
    }

    #[test]
    fn test_enriched_with_failure() {
        let entry = BookEntry::from_file(&file("corrupt.pdf")).unwrap();
        let enriched = entry.enriched_with(None);
        assert_eq!(enriched.title, "corrupt");
        assert_eq!(enriched.author, UNKNOWN_AUTHOR);
        assert!(enriched.enriched);
    }

    #[test]
    fn test_filename() {
        let entry = BookEntry::from_file(&file("Fiction/Tolkien - The Hobbit.epub")).unwrap();
        assert_eq!(entry.filename(), "Tolkien - The Hobbit.epub");
    }
}
