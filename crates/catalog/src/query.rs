//! Stateless, read-only views over a single catalog snapshot.

use crate::models::{BookEntry, Catalog};
use serde::Serialize;
use std::cmp::Reverse;
use std::sync::Arc;

/// A page of entries, 1-based. Either number may be out of range; see
/// [`PageRequest::normalize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}
impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self { page, page_size }
    }

    /// Page 0 becomes page 1, a page size of 0 becomes `default_size`, and
    /// anything over `max_size` is clamped. Never fails.
    ///
    /// ```
    /// use dropshelf_catalog::PageRequest;
    /// assert_eq!(PageRequest::new(0, 0).normalize(50, 500), PageRequest::new(1, 50));
    /// assert_eq!(PageRequest::new(3, 9000).normalize(50, 500), PageRequest::new(3, 500));
    /// ```
    pub fn normalize(self, default_size: usize, max_size: usize) -> Self {
        let max_size = max_size.max(1);
        let page_size = match self.page_size {
            0 => default_size,
            size => size,
        };
        Self {
            page: self.page.max(1),
            page_size: page_size.clamp(1, max_size),
        }
    }
}

/// One slice of a sorted, possibly filtered, catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub entries: Vec<Arc<BookEntry>>,
    /// Matching entries across all pages.
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
}
impl Page {
    pub fn total_pages(&self) -> usize {
        self.total_count.div_ceil(self.page_size.max(1))
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}

/// Listing order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Sort {
    /// Case-insensitive title, then id.
    #[default]
    Title,
    /// Most recently modified first, then id.
    Recent,
    /// Case-insensitive author, then title, then id.
    Author,
}

/// Every entry in `sort` order, sliced to the requested page. `request` must
/// already be normalized.
pub fn list(catalog: &Catalog, sort: Sort, request: PageRequest) -> Page {
    let entries = catalog.entries.values().cloned().collect();
    paginate(sorted(entries, sort), request)
}

/// Entries whose title or author contains `query`, ignoring case, in title
/// order. A blank query matches nothing.
pub fn search(catalog: &Catalog, query: &str, request: PageRequest) -> Page {
    let needle = query.trim().to_lowercase();
    let matches = match needle.is_empty() {
        true => Vec::new(),
        false => catalog
            .entries
            .values()
            .filter(|entry| entry.title.to_lowercase().contains(&needle) || entry.author.to_lowercase().contains(&needle))
            .cloned()
            .collect(),
    };
    paginate(sorted(matches, Sort::Title), request)
}

fn sorted(mut entries: Vec<Arc<BookEntry>>, sort: Sort) -> Vec<Arc<BookEntry>> {
    match sort {
        // Ids are unique, so every ordering here is total.
        Sort::Title => entries.sort_by_cached_key(|e| (e.title.to_lowercase(), e.id.clone())),
        Sort::Recent => entries.sort_by(|a, b| (Reverse(a.modified_at), &a.id).cmp(&(Reverse(b.modified_at), &b.id))),
        Sort::Author => entries.sort_by_cached_key(|e| (e.author.to_lowercase(), e.title.to_lowercase(), e.id.clone())),
    }
    entries
}

fn paginate(entries: Vec<Arc<BookEntry>>, request: PageRequest) -> Page {
    let total_count = entries.len();
    let start = request.page.saturating_sub(1).saturating_mul(request.page_size);
    let entries = entries.into_iter().skip(start).take(request.page_size).collect();
    Page {
        entries,
        total_count,
        page: request.page,
        page_size: request.page_size,
    }
}
