use super::{BookEntry, BookId};
use dropshelf_extract::BookFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// One immutable snapshot of the library.
///
/// A new generation is produced by every full scan. Enrichment produces new
/// snapshots of the *same* generation; entries that didn't change are shared
/// between snapshots rather than copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Library root this catalog was built from.
    #[serde(with = "super::os_path")]
    pub root: PathBuf,
    pub generation: u64,
    /// When the filename-only pass finished.
    #[serde(with = "time::serde::rfc3339")]
    pub built_at: OffsetDateTime,
    pub entries: BTreeMap<BookId, Arc<BookEntry>>,
}
impl Catalog {
    pub fn new(root: impl Into<PathBuf>, generation: u64, built_at: OffsetDateTime, entries: impl IntoIterator<Item = BookEntry>) -> Self {
        Self {
            root: root.into(),
            generation,
            built_at,
            entries: entries.into_iter().map(|entry| (entry.id.clone(), Arc::new(entry))).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &BookId) -> Option<&Arc<BookEntry>> {
        self.entries.get(id)
    }

    /// How long ago this catalog was built; zero if `built_at` is in the future.
    pub fn age(&self, now: OffsetDateTime) -> Duration {
        let age = now - self.built_at;
        match age.is_positive() {
            true => age.unsigned_abs(),
            false => Duration::ZERO,
        }
    }

    /// Strictly older than `ttl`.
    pub fn is_stale(&self, now: OffsetDateTime, ttl: Duration) -> bool {
        self.age(now) > ttl
    }

    pub fn enriched_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.enriched).count()
    }

    /// Entries still waiting for content extraction, in ascending path order.
    pub fn pending(&self) -> Vec<Arc<BookEntry>> {
        let mut pending: Vec<_> = self.entries.values().filter(|entry| !entry.enriched).cloned().collect();
        pending.sort_by(|a, b| a.path.cmp(&b.path));
        pending
    }

    pub fn format_counts(&self) -> BTreeMap<BookFormat, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.entries.values() {
            *counts.entry(entry.format).or_insert(0) += 1;
        }
        counts
    }

    /// Copy-on-write: a new snapshot with `updates` replacing the entries
    /// that share their ids. Updates for ids this catalog doesn't contain are
    /// ignored; enrichment never adds or removes books.
    pub fn with_updates<'a>(&self, updates: impl IntoIterator<Item = &'a Arc<BookEntry>>) -> Self {
        let mut next = self.clone();
        for update in updates {
            if let Some(slot) = next.entries.get_mut(&update.id) {
                *slot = Arc::clone(update);
            }
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropshelf_storage::FileInfo;
    use time::macros::datetime;

    fn catalog(paths: &[&str]) -> Catalog {
        let entries = paths
            .iter()
            .filter_map(|path| BookEntry::from_file(&FileInfo::new(*path, 1, datetime!(2024-01-01 00:00 UTC))));
        Catalog::new("/books", 1, datetime!(2024-06-01 12:00 UTC), entries)
    }

    #[test]
    fn test_staleness_is_strict() {
        let catalog = catalog(&[]);
        let ttl = Duration::from_secs(300);
        assert!(!catalog.is_stale(datetime!(2024-06-01 12:00 UTC), ttl));
        assert!(!catalog.is_stale(datetime!(2024-06-01 12:05 UTC), ttl));
        assert!(catalog.is_stale(datetime!(2024-06-01 12:05:01 UTC), ttl));
        // A clock that went backwards never makes a catalog stale.
        assert!(!catalog.is_stale(datetime!(2024-06-01 11:00 UTC), ttl));
        assert_eq!(catalog.age(datetime!(2024-06-01 11:00 UTC)), Duration::ZERO);
    }

    #[test]
    fn test_pending_is_sorted_by_path() {
        let catalog = catalog(&["z.epub", "a/b.pdf", "m.mobi"]);
        let paths: Vec<_> = catalog.pending().iter().map(|e| e.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("a/b.pdf"), PathBuf::from("m.mobi"), PathBuf::from("z.epub")]);
    }

    #[test]
    fn test_with_updates_is_copy_on_write() {
        let before = catalog(&["one.epub", "two.pdf"]);
        let target = before.entries.values().find(|e| e.format == BookFormat::Epub).unwrap();
        let update = Arc::new(target.enriched_with(None));
        let stranger = Arc::new(BookEntry::from_file(&FileInfo::new("new.epub", 1, before.built_at)).unwrap());
        let after = before.with_updates([&update, &stranger]);

        assert_eq!(before.enriched_count(), 0);
        assert_eq!(after.enriched_count(), 1);
        assert_eq!(after.len(), 2);
        // Untouched entries are shared, not copied.
        let untouched = before.entries.values().find(|e| e.format == BookFormat::Pdf).unwrap();
        assert!(Arc::ptr_eq(untouched, after.get(&untouched.id).unwrap()));
    }

    #[test]
    fn test_format_counts() {
        let catalog = catalog(&["a.epub", "b.epub", "c.pdf", "d.txt"]);
        let counts = catalog.format_counts();
        assert_eq!(counts.get(&BookFormat::Epub), Some(&2));
        assert_eq!(counts.get(&BookFormat::Pdf), Some(&1));
        assert_eq!(counts.get(&BookFormat::Mobi), None);
        assert_eq!(catalog.len(), 3);
    }
}
