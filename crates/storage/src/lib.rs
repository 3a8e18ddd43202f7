//! Read-only storage for ebook libraries.

pub mod backend;
pub mod error;
mod models;
mod path;

use std::sync::Arc;

pub use crate::backend::StorageBackend;
pub use crate::models::FileInfo;
pub use crate::path::{portable as portable_path, validate as validate_path};

/// How the rest of the workspace holds on to a backend.
pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
