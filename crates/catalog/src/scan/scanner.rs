use super::enrich::{Enricher, EnrichmentStatus};
use super::{MetadataExtractor, walk};
use crate::clock::Clock;
use crate::error::{ErrorKind, Result};
use crate::models::Catalog;
use crate::settings::ScanSettings;
use crate::store::CatalogStore;
use dropshelf_storage::BackendHandle;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::instrument;

/// Outcome of the most recent filename-only scan, kept so that callers who
/// queued up behind it can share it.
struct LastScan {
    attempt: u64,
    outcome: std::result::Result<Arc<Catalog>, ErrorKind>,
}

struct Inner {
    backend: BackendHandle,
    store: Arc<CatalogStore>,
    clock: Arc<dyn Clock>,
    settings: ScanSettings,
    enricher: Enricher,
    /// Held for the whole of a filename-only scan; at most one runs at a time.
    scan_lock: Mutex<Option<LastScan>>,
    /// Number of scans finished, successfully or not.
    completed: AtomicU64,
}

/// Owns the refresh policy: decides when to rescan, makes sure concurrent
/// requests share a single scan, and hands each new generation to the
/// background enrichment job.
///
/// Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct Scanner {
    inner: Arc<Inner>,
}
impl Scanner {
    pub fn new(
        backend: BackendHandle,
        store: Arc<CatalogStore>,
        extractor: Arc<dyn MetadataExtractor>,
        clock: Arc<dyn Clock>,
        settings: ScanSettings,
    ) -> Self {
        let enricher = Enricher::new(Arc::clone(&store), extractor, settings.enrichment.clone());
        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                clock,
                settings,
                enricher,
                scan_lock: Mutex::new(None),
                completed: AtomicU64::new(0),
            }),
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.inner.settings
    }

    /// Whether the current catalog is missing or older than the TTL.
    pub fn is_stale(&self) -> bool {
        self.fresh_catalog().is_none()
    }

    /// Make sure a catalog no older than the TTL is installed, scanning if
    /// necessary.
    ///
    /// Returns as soon as the filename-only pass has been installed;
    /// enrichment carries on in the background.
    pub async fn ensure_fresh(&self) -> Result<Arc<Catalog>> {
        if let Some(catalog) = self.fresh_catalog() {
            return Ok(catalog);
        }
        self.coalesced_scan(true).await
    }

    /// Rescan regardless of the catalog's age.
    pub async fn force_refresh(&self) -> Result<Arc<Catalog>> {
        self.coalesced_scan(false).await
    }

    /// Start (or restart) enrichment of the current catalog, e.g. one that was
    /// restored from disk with some entries still unenriched.
    pub fn resume(&self) -> bool {
        match self.inner.store.get_current() {
            Some(catalog) => self.inner.enricher.schedule(catalog.generation),
            None => false,
        }
    }

    pub fn enrichment_status(&self) -> EnrichmentStatus {
        self.inner.enricher.status()
    }

    /// Wait until the current generation has been fully enriched (or been
    /// superseded), returning the final progress report.
    pub async fn wait_for_enrichment(&self) -> EnrichmentStatus {
        let Some(generation) = self.inner.store.get_current().map(|c| c.generation) else {
            return self.enrichment_status();
        };
        let mut status = self.inner.enricher.subscribe();
        match status.wait_for(|s| s.generation > generation || (s.generation == generation && !s.running)).await {
            Ok(status) => *status,
            Err(_) => self.enrichment_status(),
        }
    }

    fn fresh_catalog(&self) -> Option<Arc<Catalog>> {
        let now = self.inner.clock.now();
        self.inner.store.get_current().filter(|catalog| !catalog.is_stale(now, self.inner.settings.ttl))
    }

    /// Callers that arrive while a scan is in flight wait for it and share its
    /// outcome instead of starting another one.
    async fn coalesced_scan(&self, accept_fresh: bool) -> Result<Arc<Catalog>> {
        let seen = self.inner.completed.load(Ordering::Acquire);
        let mut last = self.inner.scan_lock.lock().await;
        if let Some(previous) = last.as_ref()
            && previous.attempt > seen
        {
            tracing::debug!(attempt = previous.attempt, "sharing the outcome of a concurrent scan");
            return previous.outcome.clone().map_err(exn::Exn::from);
        }
        if accept_fresh && let Some(catalog) = self.fresh_catalog() {
            return Ok(catalog);
        }
        let attempt = last.as_ref().map_or(0, |previous| previous.attempt) + 1;
        let outcome = self.full_scan().await;
        *last = Some(LastScan {
            attempt,
            outcome: outcome.as_ref().map(Arc::clone).map_err(|e| (**e).clone()),
        });
        self.inner.completed.store(attempt, Ordering::Release);
        outcome
    }

    #[instrument(skip(self), fields(root = %self.inner.settings.root.display()))]
    async fn full_scan(&self) -> Result<Arc<Catalog>> {
        let inner = &self.inner;
        let generation = inner.store.get_current().map_or(0, |c| c.generation) + 1;
        let catalog = walk::build(&inner.backend, &inner.settings.root, generation, || inner.clock.now())
            .await
            .inspect_err(|e| tracing::warn!(error = ?e, "library scan failed; keeping the previous catalog"))?;
        let catalog = inner.store.install(catalog);
        tracing::info!(generation, entries = catalog.len(), "catalog installed");
        if let Err(e) = inner.store.persist().await {
            tracing::warn!(error = ?e, "failed to persist catalog");
        }
        inner.enricher.schedule(generation);
        Ok(catalog)
    }
}
