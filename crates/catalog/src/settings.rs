use std::path::PathBuf;
use std::time::Duration;

/// How (and how often) the library gets scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    /// Absolute library root. Recorded in every catalog so a cache file built
    /// for some other directory is never served.
    pub root: PathBuf,
    /// Maximum catalog age before the next request triggers a rescan.
    pub ttl: Duration,
    pub enrichment: EnrichmentSettings,
}
impl ScanSettings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ttl: Duration::from_secs(300),
            enrichment: EnrichmentSettings::default(),
        }
    }
}

/// Tuning for the background content-extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentSettings {
    /// Per-file limit; a file that takes longer counts as a failure.
    pub timeout: Duration,
    /// Files being extracted at the same time.
    pub workers: usize,
    /// Extraction results committed to the catalog per swap.
    pub batch_size: usize,
}
impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            workers: 1,
            batch_size: 32,
        }
    }
}

/// Everything a [`Library`](crate::Library) needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibrarySettings {
    pub scan: ScanSettings,
    /// Where the catalog is persisted between runs; `None` keeps it in memory only.
    pub cache_file: Option<PathBuf>,
    /// Used when a request asks for a page size of zero.
    pub page_size: usize,
    /// Larger page sizes are clamped to this.
    pub max_page_size: usize,
}
impl LibrarySettings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            scan: ScanSettings::new(root),
            cache_file: None,
            page_size: 50,
            max_page_size: 500,
        }
    }
}
