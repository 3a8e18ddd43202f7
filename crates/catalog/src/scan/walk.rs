use crate::error::{ErrorKind, Result};
use crate::models::{BookEntry, Catalog};
use dropshelf_storage::BackendHandle;
use exn::ResultExt;
use futures::TryStreamExt;
use std::path::Path;
use time::OffsetDateTime;
use tracing::instrument;

/// The filename-only pass: list every file under the root and turn each
/// book into an entry, without opening a single one of them.
///
/// Any listing error aborts the whole walk. A partial catalog would make
/// books silently disappear until the next successful scan.
#[instrument(skip(backend, now), fields(backend = backend.name()))]
pub(crate) async fn build(
    backend: &BackendHandle,
    root: &Path,
    generation: u64,
    now: impl FnOnce() -> OffsetDateTime,
) -> Result<Catalog> {
    let mut files = backend.list_stream();
    let mut entries = Vec::new();
    let mut skipped = 0usize;
    while let Some(file) = files.try_next().await.or_raise(|| ErrorKind::Scan(root.to_path_buf()))? {
        match BookEntry::from_file(&file) {
            Some(entry) => entries.push(entry),
            None => {
                tracing::trace!(path = %file.path.display(), "not a book; skipping");
                skipped += 1;
            },
        }
    }
    tracing::debug!(books = entries.len(), skipped, "library walk complete");
    Ok(Catalog::new(root, generation, now(), entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookId;
    use dropshelf_storage::backend::MockBackend;
    use std::sync::Arc;
    use time::macros::datetime;

    #[tokio::test]
    async fn test_every_book_gets_exactly_one_entry() {
        let backend: BackendHandle = Arc::new(MockBackend::with_files([
            ("books/Tolkien - The Hobbit.epub", Vec::from(*b"epub")),
            ("books/corrupt.pdf", Vec::from(*b"pdf")),
            ("books/deep/down/Neuromancer.MOBI", Vec::from(*b"mobi")),
            ("books/cover.jpg", Vec::from(*b"jpg")),
            ("notes.txt", Vec::from(*b"txt")),
        ]));
        let built_at = datetime!(2024-06-01 12:00 UTC);
        let catalog = build(&backend, Path::new("/library"), 4, || built_at).await.unwrap();

        assert_eq!(catalog.generation, 4);
        assert_eq!(catalog.built_at, built_at);
        assert_eq!(catalog.root, Path::new("/library"));
        assert_eq!(catalog.len(), 3);
        for path in ["books/Tolkien - The Hobbit.epub", "books/corrupt.pdf", "books/deep/down/Neuromancer.MOBI"] {
            let entry = catalog.get(&BookId::from_path(Path::new(path))).unwrap();
            assert_eq!(entry.path, Path::new(path));
            assert!(!entry.enriched);
        }
    }

    #[tokio::test]
    async fn test_empty_library() {
        let backend: BackendHandle = Arc::new(MockBackend::default());
        let catalog = build(&backend, Path::new("/library"), 1, || OffsetDateTime::UNIX_EPOCH).await.unwrap();
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn test_missing_root_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("unmounted");
        let backend: BackendHandle = Arc::new(dropshelf_storage::backend::LocalBackend::new("local", &root).unwrap());
        let err = build(&backend, &root, 1, || OffsetDateTime::UNIX_EPOCH).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Scan(root));
    }
}
