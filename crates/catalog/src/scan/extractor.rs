use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use dropshelf_extract::{BookFormat, ExtractedMetadata};
use dropshelf_storage::BackendHandle;
use exn::ResultExt;
use std::path::Path;

/// Reads descriptive metadata out of a book file.
///
/// Implementations must be safe to call on corrupt or hostile files (return
/// an error, never panic) and must never modify the file. They may be slow;
/// the scanner applies its own timeout.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, path: &Path, format: BookFormat) -> Result<ExtractedMetadata>;
}

/// The default extractor: reads the whole file through the storage backend
/// and parses it on a blocking thread.
pub struct ContentExtractor {
    backend: BackendHandle,
}
impl ContentExtractor {
    pub fn new(backend: BackendHandle) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl MetadataExtractor for ContentExtractor {
    async fn extract(&self, path: &Path, format: BookFormat) -> Result<ExtractedMetadata> {
        if !format.is_supported() {
            exn::bail!(ErrorKind::Extract);
        }
        let bytes = self.backend.read(path).await.or_raise(|| ErrorKind::Storage)?;
        // Parsing is CPU-bound and synchronous; keep it off the async workers.
        tokio::task::spawn_blocking(move || dropshelf_extract::extract(&bytes, format))
            .await
            .or_raise(|| ErrorKind::Extract)?
            .or_raise(|| ErrorKind::Extract)
    }
}
