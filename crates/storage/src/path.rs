//! Library-relative paths.
//!
//! Backends hand out paths relative to the library root and only accept
//! paths that provably stay inside it.

use crate::error::{ErrorKind, Result};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Normalize a library-relative path, refusing anything that could reach
/// outside the library.
///
/// `.` components, repeated separators and a leading `/` are dropped, and
/// `..` is resolved lexically. Fails with
/// [`InvalidPath`](crate::error::ErrorKind::InvalidPath) if a `..` would climb
/// above the root, the path is empty once normalized, it carries a Windows
/// drive prefix, or any component contains a NUL byte. Symlinks are not
/// resolved here; the backends refuse to follow them.
///
/// ```
/// use dropshelf_storage::validate_path;
/// use std::path::Path;
///
/// assert_eq!(validate_path("./Herbert//Dune.epub").unwrap(), Path::new("Herbert/Dune.epub"));
/// assert_eq!(validate_path("Herbert/../Gibson/Neuromancer.pdf").unwrap(), Path::new("Gibson/Neuromancer.pdf"));
/// assert!(validate_path("Herbert/../../etc/passwd").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(path.to_path_buf());
    let mut kept: Vec<&OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(name) if name.as_encoded_bytes().contains(&0) => exn::bail!(invalid()),
            Component::Normal(name) => kept.push(name),
            Component::ParentDir => {
                kept.pop().ok_or_else(invalid)?;
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
        }
    }
    match kept.is_empty() {
        true => exn::bail!(invalid()),
        false => Ok(kept.into_iter().collect()),
    }
}

/// The raw bytes of a relative path with components joined by `/`, the same
/// on every platform for names that are valid Unicode. Names that aren't are
/// kept byte-for-byte, so two distinct files never share a portable form.
///
/// ```
/// use dropshelf_storage::portable_path;
/// use std::path::Path;
///
/// assert_eq!(portable_path(Path::new("./Tolkien//The Hobbit.epub")), b"Tolkien/The Hobbit.epub");
/// ```
pub fn portable(path: &Path) -> Vec<u8> {
    let mut bytes = Vec::new();
    for name in path.components().filter_map(|component| match component {
        Component::Normal(name) => Some(name),
        _ => None,
    }) {
        if !bytes.is_empty() {
            bytes.push(b'/');
        }
        bytes.extend_from_slice(name.as_encoded_bytes());
    }
    bytes
}
