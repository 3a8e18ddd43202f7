//! The current catalog, and its on-disk copy.
//!
//! The in-memory pointer is authoritative; the cache file only exists so that
//! a restart within the TTL doesn't have to rescan the library.

use crate::error::{ErrorKind, Result};
use crate::models::Catalog;
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::instrument;

/// Bumped whenever the cache file layout changes; older files are ignored.
pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct CacheFileRef<'a> {
    version: u32,
    catalog: &'a Catalog,
}

#[derive(Deserialize)]
struct CacheHeader {
    version: u32,
}

#[derive(Deserialize)]
struct CacheFile {
    catalog: Catalog,
}

/// Holds exactly one current [`Catalog`] and swaps it atomically.
///
/// Readers get an [`Arc`] they can hold for as long as they like; a swap
/// never affects a snapshot somebody already has. The lock is only ever held
/// for a pointer clone or a pointer swap.
#[derive(Debug)]
pub struct CatalogStore {
    current: RwLock<Option<Arc<Catalog>>>,
    cache_file: Option<PathBuf>,
    /// At most one writer of the cache file at a time.
    persist_lock: Mutex<()>,
}
impl CatalogStore {
    /// A store that persists to `cache_file`, or only lives in memory if `None`.
    pub fn new(cache_file: Option<PathBuf>) -> Self {
        Self {
            current: RwLock::new(None),
            cache_file,
            persist_lock: Mutex::new(()),
        }
    }

    pub fn cache_file(&self) -> Option<&Path> {
        self.cache_file.as_deref()
    }

    pub fn get_current(&self) -> Option<Arc<Catalog>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the current catalog, returning the installed snapshot.
    pub fn install(&self, catalog: Catalog) -> Arc<Catalog> {
        let catalog = Arc::new(catalog);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&catalog));
        catalog
    }

    /// Compare-and-swap: replace the current catalog with `f(current)`, but
    /// only while the current catalog is still `generation`.
    ///
    /// `f` runs outside the lock and may run more than once if somebody else
    /// swaps the pointer in the meantime. Returns `None` (and installs
    /// nothing) once the generation has been superseded.
    pub fn update(&self, generation: u64, mut f: impl FnMut(&Catalog) -> Catalog) -> Option<Arc<Catalog>> {
        loop {
            let snapshot = self.get_current().filter(|c| c.generation == generation)?;
            let next = Arc::new(f(&snapshot));
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, &snapshot)) {
                *current = Some(Arc::clone(&next));
                return Some(next);
            }
        }
    }

    /// Write the latest catalog to the cache file.
    ///
    /// The file is written next to its destination and renamed into place, so
    /// a crash never leaves a torn cache behind. Returns `false` if there was
    /// nothing to do.
    #[instrument(skip(self))]
    pub async fn persist(&self) -> Result<bool> {
        let Some(path) = self.cache_file.clone() else {
            return Ok(false);
        };
        let _guard = self.persist_lock.lock().await;
        // Read the pointer only once we're the writer, so the newest catalog wins.
        let Some(catalog) = self.get_current() else {
            return Ok(false);
        };
        let generation = catalog.generation;
        let entries = catalog.len();
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_cache_file(&target, &catalog))
            .await
            .or_raise(|| ErrorKind::Persist(path.clone()))??;
        tracing::debug!(path = %path.display(), generation, entries, "catalog persisted");
        Ok(true)
    }

    /// Restore the catalog from the cache file, if there is a usable one for
    /// `root`, and install it regardless of its age.
    ///
    /// Problems with the cache file are never errors: a missing file is
    /// expected on first start, and anything else just means a rescan.
    #[instrument(skip(self, root), fields(root = %root.display()))]
    pub async fn load(&self, root: &Path) -> Option<Arc<Catalog>> {
        let path = self.cache_file.as_deref()?;
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no cache file yet");
                return None;
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cache file unreadable; ignoring");
                return None;
            },
        };
        match parse_cache_file(&bytes, root) {
            Ok(catalog) => {
                tracing::info!(
                    path = %path.display(),
                    generation = catalog.generation,
                    entries = catalog.len(),
                    "catalog restored from cache"
                );
                Some(self.install(catalog))
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = ?e, "cache file rejected; ignoring");
                None
            },
        }
    }
}

fn write_cache_file(path: &Path, catalog: &Catalog) -> Result<()> {
    let persist = || ErrorKind::Persist(path.to_path_buf());
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).or_raise(persist)?;
    let mut file = tempfile::NamedTempFile::new_in(dir).or_raise(persist)?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        let contents = CacheFileRef {
            version: CACHE_FORMAT_VERSION,
            catalog,
        };
        serde_json::to_writer(&mut writer, &contents).or_raise(persist)?;
        writer.flush().or_raise(persist)?;
    }
    file.as_file().sync_all().or_raise(persist)?;
    file.persist(path).or_raise(persist)?;
    Ok(())
}

fn parse_cache_file(bytes: &[u8], root: &Path) -> Result<Catalog> {
    let header: CacheHeader =
        serde_json::from_slice(bytes).or_raise(|| ErrorKind::InvalidCache("not a catalog cache file".to_string()))?;
    if header.version != CACHE_FORMAT_VERSION {
        exn::bail!(ErrorKind::InvalidCache(format!(
            "format version {} (expected {CACHE_FORMAT_VERSION})",
            header.version
        )));
    }
    let file: CacheFile = serde_json::from_slice(bytes).or_raise(|| ErrorKind::InvalidCache("corrupt catalog".to_string()))?;
    if file.catalog.root != root {
        exn::bail!(ErrorKind::InvalidCache(format!("built for a different root: {}", file.catalog.root.display())));
    }
    Ok(file.catalog)
}
