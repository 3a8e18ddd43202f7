//! Layered configuration for dropshelf.
//!
//! Sources are merged in order, later ones winning:
//!
//! 1. built-in defaults,
//! 2. `config.toml` in the platform configuration directory, if present,
//! 3. an explicit configuration file (TOML, YAML or JSON, by extension),
//! 4. `DROPSHELF_*` environment variables, with `__` separating nested keys
//!    (e.g. `DROPSHELF_ENRICHMENT__WORKERS=4`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use dropshelf_catalog::{EnrichmentSettings, LibrarySettings, ScanSettings};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "DROPSHELF_";
const APPLICATION: &str = "dropshelf";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the books.
    pub root: PathBuf,
    /// Where the catalog is cached between runs. `None` disables the cache.
    pub cache_file: Option<PathBuf>,
    pub ttl_secs: u64,
    pub page_size: usize,
    pub max_page_size: usize,
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub timeout_ms: u64,
    pub workers: usize,
    pub batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        let cache_file = project_dirs().map(|dirs| dirs.cache_dir().join("catalog.json"));
        Self {
            root: PathBuf::from("/books"),
            cache_file,
            ttl_secs: 300,
            page_size: 50,
            max_page_size: 500,
            enrichment: EnrichmentConfig::default(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            workers: 1,
            batch_size: 32,
        }
    }
}

impl Config {
    /// Load and validate the configuration, optionally layering `explicit`
    /// on top of the platform configuration file.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        load_from(default_config_file(), explicit)
    }

    /// Reject values that can't possibly work.
    pub fn validate(&self) -> Result<()> {
        if !self.root.is_dir() {
            exn::bail!(ErrorKind::Invalid(format!("library root {} is not a directory", self.root.display())));
        }
        if self.page_size == 0 || self.max_page_size == 0 {
            exn::bail!(ErrorKind::Invalid("page sizes must be at least 1".to_string()));
        }
        if self.page_size > self.max_page_size {
            exn::bail!(ErrorKind::Invalid(format!(
                "page_size ({}) is larger than max_page_size ({})",
                self.page_size, self.max_page_size
            )));
        }
        if self.enrichment.workers == 0 || self.enrichment.batch_size == 0 {
            exn::bail!(ErrorKind::Invalid("enrichment workers and batch_size must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn library_settings(&self) -> LibrarySettings {
        LibrarySettings {
            scan: ScanSettings {
                root: self.root.clone(),
                ttl: Duration::from_secs(self.ttl_secs),
                enrichment: EnrichmentSettings {
                    timeout: Duration::from_millis(self.enrichment.timeout_ms),
                    workers: self.enrichment.workers,
                    batch_size: self.enrichment.batch_size,
                },
            },
            cache_file: self.cache_file.clone(),
            page_size: self.page_size,
            max_page_size: self.max_page_size,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APPLICATION)
}

fn default_config_file() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

fn load_from(platform: Option<PathBuf>, explicit: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(path) = platform
        && path.is_file()
    {
        tracing::debug!(path = %path.display(), "loading platform configuration file");
        figment = figment.merge(Toml::file_exact(path));
    }
    if let Some(path) = explicit {
        if !path.is_file() {
            exn::bail!(ErrorKind::Load(format!("configuration file {} does not exist", path.display())));
        }
        tracing::debug!(path = %path.display(), "loading configuration file");
        let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
        figment = match extension.as_deref() {
            Some("toml") => figment.merge(Toml::file_exact(path)),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
            Some("json") => figment.merge(Json::file_exact(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        };
    }
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let mut config: Config = figment.extract().map_err(|e| ErrorKind::Load(e.to_string()))?;
    // The storage backend only accepts absolute roots.
    config.root = std::path::absolute(&config.root)
        .map_err(|e| ErrorKind::Invalid(format!("library root {}: {e}", config.root.display())))?;
    config.validate()?;
    Ok(config)
}
