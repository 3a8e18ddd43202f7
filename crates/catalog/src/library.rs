//! The surface everything outside this crate talks to: feed queries, book
//! lookups and downloads, and the administrative refresh/stats calls.

use crate::clock::{Clock, SystemClock};
use crate::error::{ErrorKind, Result};
use crate::models::{BookEntry, BookId, Catalog};
use crate::query::{self, Page, PageRequest, Sort};
use crate::scan::{ContentExtractor, EnrichmentStatus, MetadataExtractor, Scanner};
use crate::settings::LibrarySettings;
use crate::store::CatalogStore;
use dropshelf_extract::BookFormat;
use dropshelf_storage::BackendHandle;
use dropshelf_storage::backend::BoxSyncRead;
use exn::{OptionExt, ResultExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::instrument;

/// A book ready to be streamed to a reader.
pub struct Download {
    pub entry: Arc<BookEntry>,
    pub media_type: &'static str,
    /// Suggested filename for the client.
    pub filename: String,
    pub reader: BoxSyncRead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub generation: u64,
    pub entries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_entries: usize,
    pub enriched_count: usize,
    pub generation: Option<u64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub built_at: Option<OffsetDateTime>,
    pub cache_age_seconds: Option<u64>,
    pub formats: BTreeMap<BookFormat, usize>,
    pub enrichment: EnrichmentStatus,
}

/// Builder for [`Library`], for swapping out the extractor or clock.
pub struct LibraryBuilder {
    backend: BackendHandle,
    settings: LibrarySettings,
    extractor: Option<Arc<dyn MetadataExtractor>>,
    clock: Arc<dyn Clock>,
}
impl LibraryBuilder {
    pub fn with_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Restore the cached catalog (if any) and get ready to serve.
    ///
    /// A restored catalog is served straight away, even if it is stale; a
    /// stale one also gets a rescan started in the background. Must be called
    /// from within a Tokio runtime.
    #[instrument(skip(self), fields(root = %self.settings.scan.root.display()))]
    pub async fn open(self) -> Library {
        let Self {
            backend,
            settings,
            extractor,
            clock,
        } = self;
        let store = Arc::new(CatalogStore::new(settings.cache_file.clone()));
        let extractor =
            extractor.unwrap_or_else(|| Arc::new(ContentExtractor::new(Arc::clone(&backend))) as Arc<dyn MetadataExtractor>);
        let scanner = Scanner::new(
            Arc::clone(&backend),
            Arc::clone(&store),
            extractor,
            Arc::clone(&clock),
            settings.scan.clone(),
        );

        if store.load(&settings.scan.root).await.is_some() {
            scanner.resume();
            if scanner.is_stale() {
                tracing::info!("cached catalog is stale; rescanning in the background");
                let background = scanner.clone();
                tokio::spawn(async move {
                    if let Err(e) = background.ensure_fresh().await {
                        tracing::warn!(error = ?e, "background rescan failed; serving the cached catalog");
                    }
                });
            }
        }

        Library {
            backend,
            store,
            scanner,
            clock,
            settings,
        }
    }
}

/// An ebook library, exposed as a catalog that is always cheap to query.
pub struct Library {
    backend: BackendHandle,
    store: Arc<CatalogStore>,
    scanner: Scanner,
    clock: Arc<dyn Clock>,
    settings: LibrarySettings,
}
impl Library {
    pub fn builder(backend: BackendHandle, settings: LibrarySettings) -> LibraryBuilder {
        LibraryBuilder {
            backend,
            settings,
            extractor: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// [`Library::builder`] with the default extractor and the system clock.
    pub async fn open(backend: BackendHandle, settings: LibrarySettings) -> Library {
        Self::builder(backend, settings).open().await
    }

    pub fn settings(&self) -> &LibrarySettings {
        &self.settings
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Every book, by title.
    pub async fn list_all(&self, request: PageRequest) -> Result<Page> {
        self.list(Sort::Title, request).await
    }

    /// Every book, most recently modified first.
    pub async fn list_recent(&self, request: PageRequest) -> Result<Page> {
        self.list(Sort::Recent, request).await
    }

    /// Every book, by author.
    pub async fn list_by_author(&self, request: PageRequest) -> Result<Page> {
        self.list(Sort::Author, request).await
    }

    pub async fn list(&self, sort: Sort, request: PageRequest) -> Result<Page> {
        let catalog = self.snapshot().await?;
        Ok(query::list(&catalog, sort, self.normalize(request)))
    }

    /// Books whose title or author contains `query`, ignoring case.
    pub async fn search(&self, query: &str, request: PageRequest) -> Result<Page> {
        let catalog = self.snapshot().await?;
        Ok(query::search(&catalog, query, self.normalize(request)))
    }

    pub async fn get(&self, id: &BookId) -> Result<Option<Arc<BookEntry>>> {
        let catalog = self.snapshot().await?;
        Ok(catalog.get(id).cloned())
    }

    /// Open a book's file for download.
    #[instrument(skip(self, id), fields(id = %id))]
    pub async fn open_book(&self, id: &BookId) -> Result<Download> {
        let entry = self.get(id).await?.ok_or_raise(|| ErrorKind::NotFound(id.to_string()))?;
        let reader = self.backend.reader(&entry.path).await.or_raise(|| ErrorKind::Storage)?;
        Ok(Download {
            media_type: entry.format.media_type(),
            filename: entry.filename(),
            reader,
            entry,
        })
    }

    /// Rescan now, whatever the catalog's age.
    pub async fn refresh(&self) -> Result<RefreshSummary> {
        let catalog = self.scanner.force_refresh().await?;
        Ok(RefreshSummary {
            generation: catalog.generation,
            entries: catalog.len(),
        })
    }

    /// Describes the current catalog without triggering a scan.
    pub fn stats(&self) -> Stats {
        let enrichment = self.scanner.enrichment_status();
        match self.store.get_current() {
            Some(catalog) => Stats {
                total_entries: catalog.len(),
                enriched_count: catalog.enriched_count(),
                generation: Some(catalog.generation),
                built_at: Some(catalog.built_at),
                cache_age_seconds: Some(catalog.age(self.clock.now()).as_secs()),
                formats: catalog.format_counts(),
                enrichment,
            },
            None => Stats {
                total_entries: 0,
                enriched_count: 0,
                generation: None,
                built_at: None,
                cache_age_seconds: None,
                formats: BTreeMap::new(),
                enrichment,
            },
        }
    }

    /// Resolves once the current generation has finished enriching.
    pub async fn wait_for_enrichment(&self) -> EnrichmentStatus {
        self.scanner.wait_for_enrichment().await
    }

    /// Let any enrichment job still in flight run to completion, so that its
    /// results reach the cache file. Short-lived processes call this before
    /// exiting, otherwise a rescan they triggered leaves a filename-only
    /// catalog on disk.
    ///
    /// Returns `None` if nothing was running.
    pub async fn finish_background_work(&self) -> Option<EnrichmentStatus> {
        if !self.scanner.enrichment_status().running {
            return None;
        }
        tracing::info!("waiting for metadata extraction to finish");
        Some(self.wait_for_enrichment().await)
    }

    fn normalize(&self, request: PageRequest) -> PageRequest {
        request.normalize(self.settings.page_size, self.settings.max_page_size)
    }

    /// One consistent snapshot for a whole request, no older than the TTL if
    /// at all possible. A failed rescan falls back to the catalog we have.
    async fn snapshot(&self) -> Result<Arc<Catalog>> {
        match self.scanner.ensure_fresh().await {
            // Prefer the current pointer: enrichment may have moved on since.
            Ok(installed) => Ok(self.store.get_current().unwrap_or(installed)),
            Err(e) => match self.store.get_current() {
                Some(stale) => {
                    tracing::warn!(error = ?e, generation = stale.generation, "rescan failed; serving stale catalog");
                    Ok(stale)
                },
                None => Err(e),
            },
        }
    }
}
