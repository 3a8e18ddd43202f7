//! The content pass: open each book of one generation, pull out its real
//! title and author, and commit the results back in batches.
//!
//! A job belongs to exactly one generation. As soon as a newer full scan is
//! installed, the job's commits are refused and it gives up.

use super::MetadataExtractor;
use crate::error::ErrorKind;
use crate::models::BookEntry;
use crate::settings::EnrichmentSettings;
use crate::store::CatalogStore;
use dropshelf_extract::ExtractedMetadata;
use exn::ResultExt;
use futures::StreamExt;
use serde::Serialize;
use std::convert::identity;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::instrument;

/// Progress of the most recently scheduled enrichment job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentStatus {
    /// Generation the job belongs to.
    pub generation: u64,
    pub running: bool,
    /// Entries that needed extraction when the job started.
    pub total: usize,
    /// Entries attempted so far (successfully or not).
    pub processed: usize,
    /// Attempts that failed or timed out.
    pub failed: usize,
}

/// How an enrichment job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { processed: usize, failed: usize },
    /// A newer generation was installed; remaining work was dropped.
    Abandoned,
}

#[derive(Clone)]
pub(crate) struct Enricher {
    store: Arc<CatalogStore>,
    extractor: Arc<dyn MetadataExtractor>,
    settings: EnrichmentSettings,
    status: Arc<watch::Sender<EnrichmentStatus>>,
}
impl Enricher {
    pub(crate) fn new(store: Arc<CatalogStore>, extractor: Arc<dyn MetadataExtractor>, settings: EnrichmentSettings) -> Self {
        Self {
            store,
            extractor,
            settings,
            status: Arc::new(watch::Sender::new(EnrichmentStatus::default())),
        }
    }

    pub(crate) fn status(&self) -> EnrichmentStatus {
        *self.status.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<EnrichmentStatus> {
        self.status.subscribe()
    }

    /// Record `generation` as the one being enriched and, if any of its
    /// entries still need work, start a background job for it.
    ///
    /// Returns `false` if there was nothing to do, or a job for this
    /// generation is already running.
    pub(crate) fn schedule(&self, generation: u64) -> bool {
        let Some(catalog) = self.store.get_current().filter(|c| c.generation == generation) else {
            return false;
        };
        let total = catalog.len() - catalog.enriched_count();
        let claimed = self.status.send_if_modified(|status| {
            let duplicate = status.generation == generation && status.running;
            if generation < status.generation || duplicate {
                return false;
            }
            *status = EnrichmentStatus {
                generation,
                running: total > 0,
                total,
                processed: 0,
                failed: 0,
            };
            true
        });
        if !claimed || total == 0 {
            return false;
        }
        let job = self.clone();
        tokio::spawn(async move { job.run(generation).await });
        true
    }

    /// Run the job for `generation` to completion (or abandonment).
    #[instrument(skip(self))]
    pub(crate) async fn run(&self, generation: u64) -> JobOutcome {
        let Some(catalog) = self.store.get_current().filter(|c| c.generation == generation) else {
            return self.abandon(generation, 0);
        };
        let pending = catalog.pending();
        drop(catalog);
        self.update_status(generation, |status| {
            status.running = true;
            status.total = pending.len();
        });
        tracing::info!(entries = pending.len(), workers = self.settings.workers, "enrichment started");

        let timeout = self.settings.timeout;
        let batch_size = self.settings.batch_size.max(1);
        let mut results = futures::stream::iter(pending)
            // Stop handing out work the moment a newer scan lands.
            .take_while(|_| futures::future::ready(self.is_current(generation)))
            .map(|entry| {
                let extractor = Arc::clone(&self.extractor);
                async move {
                    let metadata = extract_one(extractor.as_ref(), &entry, timeout).await;
                    (entry, metadata)
                }
            })
            // `buffered` keeps results in path order however many run at once.
            .buffered(self.settings.workers.max(1));

        let mut batch = Vec::with_capacity(batch_size);
        let (mut processed, mut failed) = (0, 0);
        while let Some((entry, metadata)) = results.next().await {
            if !self.is_current(generation) {
                return self.abandon(generation, processed);
            }
            processed += 1;
            if metadata.is_none() {
                failed += 1;
            }
            batch.push(Arc::new(entry.enriched_with(metadata.as_ref())));
            self.update_status(generation, |status| {
                status.processed = processed;
                status.failed = failed;
            });
            if batch.len() >= batch_size && !self.commit(generation, &mut batch) {
                return self.abandon(generation, processed);
            }
        }
        if !self.is_current(generation) || (!batch.is_empty() && !self.commit(generation, &mut batch)) {
            return self.abandon(generation, processed);
        }

        tracing::info!(processed, failed, "enrichment complete");
        if processed > 0
            && let Err(e) = self.store.persist().await
        {
            tracing::warn!(error = ?e, "failed to persist enriched catalog");
        }
        // Only reported as finished once the cache file has caught up.
        self.update_status(generation, |status| status.running = false);
        JobOutcome::Completed { processed, failed }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.store.get_current().is_some_and(|catalog| catalog.generation == generation)
    }

    /// Swap the batch into the catalog, if it is still ours.
    fn commit(&self, generation: u64, batch: &mut Vec<Arc<BookEntry>>) -> bool {
        let committed = self.store.update(generation, |catalog| catalog.with_updates(batch.iter())).is_some();
        if committed {
            tracing::trace!(entries = batch.len(), "enrichment batch committed");
            batch.clear();
        }
        committed
    }

    fn abandon(&self, generation: u64, processed: usize) -> JobOutcome {
        self.update_status(generation, |status| status.running = false);
        tracing::debug!(processed, "generation superseded; enrichment abandoned");
        JobOutcome::Abandoned
    }

    /// Only touch the status if no newer job has claimed it.
    fn update_status(&self, generation: u64, f: impl FnOnce(&mut EnrichmentStatus)) {
        self.status.send_if_modified(|status| match status.generation == generation {
            true => {
                f(status);
                true
            },
            false => false,
        });
    }
}

/// `None` on any failure; a failure is just as final as a success.
async fn extract_one(extractor: &dyn MetadataExtractor, entry: &BookEntry, timeout: Duration) -> Option<ExtractedMetadata> {
    let attempt = tokio::time::timeout(timeout, extractor.extract(&entry.path, entry.format))
        .await
        .or_raise(|| ErrorKind::Timeout)
        .and_then(identity);
    match attempt {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            tracing::debug!(path = %entry.path.display(), error = ?e, "metadata extraction failed");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::models::{BookId, Catalog, UNKNOWN_AUTHOR};
    use async_trait::async_trait;
    use dropshelf_extract::BookFormat;
    use dropshelf_storage::FileInfo;
    use std::path::Path;
    use std::sync::Mutex;
    use time::macros::datetime;

    /// Titles every file as "<stem> (extracted)", except files called
    /// `corrupt.*` (fail) and `slow.*` (hang).
    #[derive(Default)]
    struct FakeExtractor {
        seen: Mutex<Vec<String>>,
    }
    #[async_trait]
    impl MetadataExtractor for FakeExtractor {
        async fn extract(&self, path: &Path, _format: BookFormat) -> Result<ExtractedMetadata> {
            let stem = path.file_stem().unwrap().to_string_lossy().into_owned();
            self.seen.lock().unwrap().push(path.to_string_lossy().into_owned());
            match stem.as_str() {
                "corrupt" => exn::bail!(ErrorKind::Extract),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!()
                },
                _ => Ok(ExtractedMetadata {
                    title: Some(format!("{stem} (extracted)")),
                    author: Some("Somebody".to_string()),
                }),
            }
        }
    }

    fn catalog(generation: u64, paths: &[&str]) -> Catalog {
        let files: Vec<_> = paths.iter().map(|p| FileInfo::new(*p, 1, datetime!(2024-01-01 00:00 UTC))).collect();
        Catalog::new("/books", generation, datetime!(2024-06-01 00:00 UTC), files.iter().filter_map(BookEntry::from_file))
    }

    fn enricher(store: &Arc<CatalogStore>, extractor: &Arc<FakeExtractor>, batch_size: usize) -> Enricher {
        let settings = EnrichmentSettings {
            timeout: Duration::from_millis(50),
            workers: 2,
            batch_size,
        };
        Enricher::new(Arc::clone(store), Arc::clone(extractor) as Arc<dyn MetadataExtractor>, settings)
    }

    fn entry(store: &CatalogStore, path: &str) -> Arc<BookEntry> {
        Arc::clone(store.get_current().unwrap().get(&BookId::from_path(Path::new(path))).unwrap())
    }

    #[tokio::test]
    async fn test_successes_and_failures_are_both_final() {
        let store = Arc::new(CatalogStore::new(None));
        store.install(catalog(1, &["b/Dune.pdf", "a/corrupt.pdf", "c/slow.epub"]));
        let extractor = Arc::new(FakeExtractor::default());
        let job = enricher(&store, &extractor, 2);

        let outcome = job.run(1).await;
        assert_eq!(outcome, JobOutcome::Completed { processed: 3, failed: 2 });

        let dune = entry(&store, "b/Dune.pdf");
        assert_eq!(dune.title, "Dune (extracted)");
        assert_eq!(dune.author, "Somebody");
        let corrupt = entry(&store, "a/corrupt.pdf");
        assert_eq!(corrupt.title, "corrupt");
        assert_eq!(corrupt.author, UNKNOWN_AUTHOR);
        let slow = entry(&store, "c/slow.epub");
        assert_eq!(slow.title, "slow");
        assert_eq!(store.get_current().unwrap().enriched_count(), 3);

        // Extraction is attempted in path order.
        assert_eq!(*extractor.seen.lock().unwrap(), vec!["a/corrupt.pdf", "b/Dune.pdf", "c/slow.epub"]);
    }

    #[tokio::test]
    async fn test_running_twice_changes_nothing() {
        let store = Arc::new(CatalogStore::new(None));
        store.install(catalog(1, &["Dune.pdf", "corrupt.epub"]));
        let extractor = Arc::new(FakeExtractor::default());
        let job = enricher(&store, &extractor, 32);

        job.run(1).await;
        let once = store.get_current().unwrap();
        let outcome = job.run(1).await;
        assert_eq!(outcome, JobOutcome::Completed { processed: 0, failed: 0 });
        assert_eq!(*store.get_current().unwrap(), *once);
    }

    #[tokio::test]
    async fn test_superseded_generation_is_discarded() {
        let store = Arc::new(CatalogStore::new(None));
        store.install(catalog(1, &["Dune.pdf"]));
        let extractor = Arc::new(FakeExtractor::default());
        let job = enricher(&store, &extractor, 1);

        // Generation 2 lands before generation 1's results are committed.
        store.install(catalog(2, &["Dune.pdf"]));
        let mut batch = vec![Arc::new(entry(&store, "Dune.pdf").enriched_with(None))];
        assert!(!job.commit(1, &mut batch));
        assert_eq!(batch.len(), 1);
        assert_eq!(store.get_current().unwrap().enriched_count(), 0);

        assert_eq!(job.run(1).await, JobOutcome::Abandoned);
        assert_eq!(store.get_current().unwrap().enriched_count(), 0);
        assert!(extractor.seen.lock().unwrap().is_empty());
    }

    /// Installs a newer generation while reading the first book.
    struct RescanningExtractor {
        store: Arc<CatalogStore>,
        seen: Mutex<Vec<String>>,
    }
    #[async_trait]
    impl MetadataExtractor for RescanningExtractor {
        async fn extract(&self, path: &Path, _format: BookFormat) -> Result<ExtractedMetadata> {
            self.seen.lock().unwrap().push(path.to_string_lossy().into_owned());
            self.store.install(catalog(2, &["a.epub", "b.epub", "c.epub", "d.epub"]));
            Ok(ExtractedMetadata {
                title: Some("Read".to_string()),
                author: None,
            })
        }
    }

    #[tokio::test]
    async fn test_superseded_job_stops_before_the_next_book() {
        let store = Arc::new(CatalogStore::new(None));
        store.install(catalog(1, &["a.epub", "b.epub", "c.epub", "d.epub"]));
        let extractor = Arc::new(RescanningExtractor {
            store: Arc::clone(&store),
            seen: Mutex::default(),
        });
        let settings = EnrichmentSettings {
            timeout: Duration::from_secs(5),
            workers: 1,
            batch_size: 32,
        };
        let job = Enricher::new(Arc::clone(&store), Arc::clone(&extractor) as Arc<dyn MetadataExtractor>, settings);

        assert_eq!(job.run(1).await, JobOutcome::Abandoned);
        // Only the book that was already being read when generation 2 landed.
        assert_eq!(*extractor.seen.lock().unwrap(), vec!["a.epub"]);
        let current = store.get_current().unwrap();
        assert_eq!(current.generation, 2);
        assert_eq!(current.enriched_count(), 0);
    }

    #[tokio::test]
    async fn test_schedule_reports_progress() {
        let store = Arc::new(CatalogStore::new(None));
        store.install(catalog(5, &["one.epub", "two.pdf", "corrupt.mobi"]));
        let extractor = Arc::new(FakeExtractor::default());
        let job = enricher(&store, &extractor, 32);
        let mut status = job.subscribe();

        assert!(job.schedule(5));
        // Already running for this generation.
        assert!(!job.schedule(5));
        let done = *status.wait_for(|s| s.generation == 5 && !s.running).await.unwrap();
        assert_eq!(done, EnrichmentStatus { generation: 5, running: false, total: 3, processed: 3, failed: 1 });
        assert_eq!(store.get_current().unwrap().enriched_count(), 3);

        // Nothing left to do for this generation.
        assert!(!job.schedule(5));
        // Generations that aren't current are never scheduled.
        assert!(!job.schedule(4));
    }
}
