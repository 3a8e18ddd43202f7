//! An always-queryable catalog of the ebooks under a single directory.
//!
//! Scanning happens in two phases. A filename-only pass lists every book and
//! is installed as soon as it finishes, so that queries never wait on file
//! contents; a background pass then reads each file's embedded title and
//! author and swaps improved catalogs in as it goes. The most recent catalog
//! is persisted so that a restart can serve straight away.

pub mod clock;
pub mod error;
mod library;
mod models;
pub mod query;
pub mod scan;
mod settings;
pub mod store;

pub use crate::library::{Download, Library, LibraryBuilder, RefreshSummary, Stats};
pub use crate::models::{BookEntry, BookId, Catalog, UNKNOWN_AUTHOR};
pub use crate::query::{Page, PageRequest, Sort};
pub use crate::scan::{ContentExtractor, EnrichmentStatus, MetadataExtractor, Scanner};
pub use crate::settings::{EnrichmentSettings, LibrarySettings, ScanSettings};
pub use crate::store::CatalogStore;
pub use dropshelf_extract::{BookFormat, ExtractedMetadata};
