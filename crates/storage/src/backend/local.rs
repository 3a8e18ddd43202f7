//! Read-only access to a library on the local filesystem (or anything
//! mounted into it, such as an NFS or SMB share).
//!
//! All I/O goes through `tokio::fs`. Nothing here opens a file for writing.

use crate::backend::{BoxSyncRead, FileInfoStream};
use crate::error::ErrorKind;
use crate::{FileInfo, StorageBackend, error::Result, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::ffi::OsStr;
use std::fs::Metadata;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

/// What the walk should do with one directory entry.
enum Visit {
    File(FileInfo),
    Enter(PathBuf),
    Ignore,
}

/// A library rooted at an absolute directory.
///
/// Hidden entries (anything whose name starts with a dot, such as macOS
/// `._Book.epub` resource forks or a `.Trash` directory) and symbolic links
/// are never listed or descended into.
///
/// # Examples
///
/// ```no_run
/// use dropshelf_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("books", "/srv/books")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}
impl LocalBackend {
    /// The root does not have to exist yet (network mounts come and go); a
    /// missing root is reported when the library is listed instead.
    ///
    /// # Errors
    ///
    /// [`InvalidPath`](ErrorKind::InvalidPath) if `root` is relative, or
    /// exists but is not a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        match (root.is_absolute(), root.try_exists()) {
            (false, _) => exn::bail!(ErrorKind::InvalidPath(root)),
            (true, Ok(true)) if !root.is_dir() => exn::bail!(ErrorKind::InvalidPath(root)),
            (true, Ok(false)) => tracing::warn!(root = %root.display(), "library root does not exist (yet)"),
            (true, _) => {},
        }
        Ok(Self { name: name.into(), root })
    }

    /// The absolute library root this backend reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a library-relative path lives on disk. Rejects anything that
    /// would escape the root.
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(path)?))
    }

    /// The library-relative form of a path found while walking.
    fn relative_to_root(&self, found: &Path) -> Result<PathBuf> {
        let relative = found.strip_prefix(&self.root).or_raise(|| ErrorKind::OutsideRoot(found.to_path_buf()))?;
        validate_path(relative)
    }

    fn file_info(relative: PathBuf, metadata: &Metadata) -> Result<FileInfo> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?;
        Ok(FileInfo::new(relative, metadata.len(), modified.into()))
    }

    fn io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            IoErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            IoErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Everything fallible about a single entry, since `?` is not available
    /// inside `stream!`.
    async fn visit(&self, entry: DirEntry) -> Result<Visit> {
        if is_hidden(&entry.file_name()) {
            return Ok(Visit::Ignore);
        }
        let path = entry.path();
        // Doesn't follow symlinks, so a link is neither a file nor a directory here.
        let metadata = entry.metadata().await.map_err(|e| Self::io_error(e, &path))?;
        if metadata.is_dir() {
            Ok(Visit::Enter(path))
        } else if metadata.is_file() {
            Ok(Visit::File(Self::file_info(self.relative_to_root(&path)?, &metadata)?))
        } else {
            Ok(Visit::Ignore)
        }
    }
}

fn is_hidden(name: &OsStr) -> bool {
    name.as_encoded_bytes().first() == Some(&b'.')
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    /// Depth-first, with no particular ordering inside a directory.
    fn list_stream(&self) -> FileInfoStream<'_> {
        let mut pending = vec![self.root.clone()];

        Box::pin(stream! {
            while let Some(dir) = pending.pop() {
                let mut listing = match fs::read_dir(&dir).await {
                    Ok(listing) => listing,
                    // Removed since its parent was listed: nothing to report.
                    Err(e) if e.kind() == IoErrorKind::NotFound && dir != self.root => continue,
                    Err(e) => {
                        yield Err(exn::Exn::from(Self::io_error(e, &dir)));
                        continue;
                    },
                };
                loop {
                    match listing.next_entry().await {
                        Ok(Some(entry)) => match self.visit(entry).await {
                            Ok(Visit::File(info)) => yield Ok(info),
                            Ok(Visit::Enter(child)) => pending.push(child),
                            Ok(Visit::Ignore) => {},
                            Err(e) => yield Err(e),
                        },
                        Ok(None) => break,
                        Err(e) => {
                            yield Err(exn::Exn::from(Self::io_error(e, &dir)));
                            break;
                        },
                    }
                }
            }
        })
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let on_disk = self.resolve(path)?;
        Ok(fs::read(&on_disk).await.map_err(|e| Self::io_error(e, path))?)
    }

    async fn reader(&self, path: &Path) -> Result<BoxSyncRead> {
        let on_disk = self.resolve(path)?;
        let file = fs::File::open(&on_disk).await.map_err(|e| Self::io_error(e, path))?;
        Ok(Box::new(file.into_std().await))
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let relative = validate_path(path)?;
        let metadata = fs::metadata(self.root.join(&relative)).await.map_err(|e| Self::io_error(e, path))?;
        match metadata.is_file() {
            true => Self::file_info(relative, &metadata),
            false => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
        }
    }
}
