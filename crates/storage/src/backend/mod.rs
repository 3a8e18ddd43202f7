//! Where a library's books actually live.
//!
//! [`StorageBackend`] is deliberately read-only: a catalog is built from a
//! library, it never changes one.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::models::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::io::Read;
use std::path::Path;
use std::pin::Pin;

pub type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;
/// A blocking reader that owns everything it needs, so it can be moved onto
/// a blocking thread or handed to whatever serves a download.
pub type BoxSyncRead = Box<dyn Read + Send + 'static>;

/// Read-only access to a library of book files.
///
/// Every path going in or coming out is relative to the library root.
/// Implementations run incoming paths through
/// [`validate_path`](crate::validate_path) and must never touch anything
/// outside the root.
///
/// ```
/// use dropshelf_storage::{backend::StorageBackend, error::Result};
/// use std::path::Path;
///
/// async fn hobbit_size(backend: &dyn StorageBackend) -> Result<u64> {
///     Ok(backend.stat(Path::new("Tolkien/The Hobbit.epub")).await?.size)
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Shows up in logs, nowhere else.
    fn name(&self) -> &str;

    /// Every file in the library, collected from
    /// [`list_stream`](Self::list_stream). The first error wins.
    async fn list(&self) -> Result<Vec<FileInfo>> {
        self.list_stream().try_collect().await
    }

    /// Every file in the library, at any depth, as it is found.
    ///
    /// Not just books: deciding what counts as one is up to the caller. An
    /// unreadable directory comes out as an `Err` item and the walk goes on,
    /// so the caller decides whether that is fatal. A missing root is always
    /// an error; an empty library is not.
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// # use dropshelf_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut files = backend.list_stream();
    /// while let Some(file) = files.try_next().await? {
    ///     println!("{} ({} bytes)", file.path.display(), file.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream(&self) -> FileInfoStream<'_>;

    /// The whole file in memory.
    /// [`NotFound`](crate::error::ErrorKind::NotFound) if there is no such file.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// The file opened for streaming. Opening happens here, so a missing file
    /// is reported as [`NotFound`](crate::error::ErrorKind::NotFound) straight
    /// away rather than on first read.
    async fn reader(&self, path: &Path) -> Result<BoxSyncRead>;

    /// Size and modification time, without reading anything. Directories
    /// count as [`NotFound`](crate::error::ErrorKind::NotFound).
    async fn stat(&self, path: &Path) -> Result<FileInfo>;
}
