//! An in-memory library, for tests in this and other crates.

use super::{BoxSyncRead, FileInfoStream};
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::models::FileInfo;
use crate::path::validate as validate_path;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Clone)]
struct MockFile {
    modified: OffsetDateTime,
    contents: Vec<u8>,
}
impl MockFile {
    fn info(&self, path: &Path) -> FileInfo {
        FileInfo::new(path, self.contents.len() as u64, self.modified)
    }
}

/// A library that only exists in memory.
///
/// The [`StorageBackend`] trait is read-only, so tests change the library
/// through the inherent [`put`](Self::put), [`put_at`](Self::put_at) and
/// [`remove`](Self::remove) methods. Listings come out in path order.
///
/// ```
/// use dropshelf_storage::backend::{MockBackend, StorageBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([("Tolkien/The Hobbit.epub", b"PK..")]);
/// backend.put("Herbert/Dune.pdf", b"%PDF-1.7").await;
/// let paths: Vec<_> = backend.list().await?.into_iter().map(|f| f.path).collect();
/// assert_eq!(paths.len(), 2);
/// assert!(paths[0].starts_with("Herbert"));
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    files: RwLock<BTreeMap<PathBuf, MockFile>>,
    unreadable: AtomicBool,
}

impl MockBackend {
    /// Every file is stamped with the current time.
    ///
    /// # Panics
    ///
    /// If any path would escape the library root. Broken test setup should
    /// never get as far as an assertion.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let modified = OffsetDateTime::now_utc();
        let files = files
            .into_iter()
            .map(|(path, contents)| {
                let file = MockFile {
                    modified,
                    contents: contents.into(),
                };
                (Self::valid(path.into()), file)
            })
            .collect();
        Self {
            name: "mock".to_string(),
            files: RwLock::new(files),
            unreadable: AtomicBool::new(false),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add or replace a file, modified now.
    pub async fn put(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.put_at(path, contents, OffsetDateTime::now_utc()).await;
    }

    pub async fn put_at(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>, modified: OffsetDateTime) {
        let file = MockFile {
            modified,
            contents: contents.into(),
        };
        self.files.write().await.insert(Self::valid(path.into()), file);
    }

    /// Returns whether there was anything to remove.
    pub async fn remove(&self, path: impl AsRef<Path>) -> bool {
        let Ok(path) = validate_path(path.as_ref()) else {
            return false;
        };
        self.files.write().await.remove(&path).is_some()
    }

    /// Make listing the library fail, as if the root had become unreadable.
    /// Individual files can still be read.
    pub fn set_unreadable(&self, unreadable: bool) {
        self.unreadable.store(unreadable, Ordering::SeqCst);
    }

    fn valid(path: PathBuf) -> PathBuf {
        match validate_path(&path) {
            Ok(valid) => valid,
            Err(_) => panic!("MockBackend: invalid path {}", path.display()),
        }
    }

    async fn file(&self, path: &Path) -> Result<(PathBuf, MockFile)> {
        let path = validate_path(path)?;
        match self.files.read().await.get(&path) {
            Some(file) => Ok((path, file.clone())),
            None => exn::bail!(ErrorKind::NotFound(path)),
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::with_files(Vec::<(PathBuf, Vec<u8>)>::new())
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream(&self) -> FileInfoStream<'_> {
        Box::pin(async_stream::stream! {
            if self.unreadable.load(Ordering::SeqCst) {
                yield Err(exn::Exn::from(ErrorKind::PermissionDenied(PathBuf::from("."))));
            } else {
                // Copy the listing out so that the lock isn't held across yields.
                let listing: Vec<FileInfo> = self.files.read().await.iter().map(|(path, file)| file.info(path)).collect();
                for info in listing {
                    yield Ok(info);
                }
            }
        })
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(self.file(path).await?.1.contents)
    }

    async fn reader(&self, path: &Path) -> Result<BoxSyncRead> {
        let (_, file) = self.file(path).await?;
        Ok(Box::new(Cursor::new(file.contents)))
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let (path, file) = self.file(path).await?;
        Ok(file.info(&path))
    }
}
