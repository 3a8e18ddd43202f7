use std::path::PathBuf;
use time::OffsetDateTime;

/// One file in a library listing: whatever a `stat` can tell us, without
/// opening the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative to the library root.
    pub path: PathBuf,
    /// In bytes.
    pub size: u64,
    pub modified: OffsetDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: OffsetDateTime) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
        }
    }

    /// Lowercased extension, if there is one. `Dune.EPUB` gives `epub`.
    pub fn extension(&self) -> Option<String> {
        self.path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_extension() {
        let info = |path: &str| FileInfo::new(path, 0, datetime!(2024-01-01 00:00 UTC));
        assert_eq!(info("Herbert/Dune.EPUB").extension().as_deref(), Some("epub"));
        assert_eq!(info("archive.tar.pdf").extension().as_deref(), Some("pdf"));
        assert_eq!(info("README").extension(), None);
        assert_eq!(info(".hidden").extension(), None);
    }
}
