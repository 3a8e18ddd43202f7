use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
    str::FromStr,
};

use crate::error::{Error, ErrorKind};

/// Book file format, decided purely by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum BookFormat {
    /// (.epub) Electronic Publication
    Epub,
    /// (.pdf) Portable Document Format
    Pdf,
    /// (.mobi) Mobipocket
    Mobi,
    /// Anything else
    Unknown,
}
impl BookFormat {
    /// Every format a library file can be listed as, in display order.
    pub const ALL: [BookFormat; 4] = [Self::Epub, Self::Pdf, Self::Mobi, Self::Unknown];

    /// Determine the format from a path's extension (case-insensitive).
    ///
    /// ```
    /// use dropshelf_extract::BookFormat;
    /// assert_eq!(BookFormat::from_path("Tolkien/The Hobbit.EPUB"), BookFormat::Epub);
    /// assert_eq!(BookFormat::from_path("notes.txt"), BookFormat::Unknown);
    /// assert_eq!(BookFormat::from_path("no-extension"), BookFormat::Unknown);
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) => Self::from_extension(ext),
            None => Self::Unknown,
        }
    }

    /// Determine the format from a bare extension, with or without the leading dot.
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "epub" => Self::Epub,
            "pdf" => Self::Pdf,
            "mobi" => Self::Mobi,
            _ => Self::Unknown,
        }
    }

    /// Whether files of this format belong in the catalog at all.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// The canonical file extension (without the dot).
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Epub => Some("epub"),
            Self::Pdf => Some("pdf"),
            Self::Mobi => Some("mobi"),
            Self::Unknown => None,
        }
    }

    /// MIME type used when handing the file to a reader.
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Epub => "application/epub+zip",
            Self::Pdf => "application/pdf",
            Self::Mobi => "application/x-mobipocket-ebook",
            Self::Unknown => "application/octet-stream",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Epub => "EPUB",
            Self::Pdf => "PDF",
            Self::Mobi => "MOBI",
            Self::Unknown => "UNKNOWN",
        }
    }
}
impl FromStr for BookFormat {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "epub" => Self::Epub,
            "pdf" => Self::Pdf,
            "mobi" => Self::Mobi,
            "unknown" => Self::Unknown,
            _ => exn::bail!(ErrorKind::UnknownFormat(s.to_string())),
        })
    }
}
impl Display for BookFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("book.epub", BookFormat::Epub)]
    #[case("book.EPUB", BookFormat::Epub)]
    #[case("Some/Dir/book.Pdf", BookFormat::Pdf)]
    #[case("book.mobi", BookFormat::Mobi)]
    #[case("book.azw3", BookFormat::Unknown)]
    #[case("book.epub.bak", BookFormat::Unknown)]
    #[case(".epub", BookFormat::Unknown)]
    #[case("README", BookFormat::Unknown)]
    fn test_from_path(#[case] path: &str, #[case] expected: BookFormat) {
        assert_eq!(BookFormat::from_path(path), expected);
    }

    #[test]
    fn test_supported() {
        assert!(BookFormat::Epub.is_supported());
        assert!(BookFormat::Pdf.is_supported());
        assert!(BookFormat::Mobi.is_supported());
        assert!(!BookFormat::Unknown.is_supported());
    }

    #[test]
    fn test_media_types() {
        assert_eq!(BookFormat::Epub.media_type(), "application/epub+zip");
        assert_eq!(BookFormat::Pdf.media_type(), "application/pdf");
        assert_eq!(BookFormat::Mobi.media_type(), "application/x-mobipocket-ebook");
        assert_eq!(BookFormat::Unknown.media_type(), "application/octet-stream");
    }

    #[test]
    fn test_parse_and_display() {
        for format in BookFormat::ALL {
            assert_eq!(format.to_string().parse::<BookFormat>().unwrap(), format);
        }
        assert!("djvu".parse::<BookFormat>().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_uses_uppercase_names() {
        assert_eq!(serde_json::to_string(&BookFormat::Mobi).unwrap(), r#""MOBI""#);
        assert_eq!(serde_json::from_str::<BookFormat>(r#""EPUB""#).unwrap(), BookFormat::Epub);
    }
}
