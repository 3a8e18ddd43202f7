//! Serde helpers for paths that may not be valid UTF-8.
//!
//! Unicode paths are written as plain strings. Anything else is written as
//! serde's `OsString` form (the platform's raw encoding, tagged with the
//! platform), so a name is never altered on its way through the cache file.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

#[derive(Serialize)]
#[serde(untagged)]
enum Borrowed<'a> {
    Text(&'a str),
    Raw(&'a OsStr),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Owned {
    Text(String),
    Raw(OsString),
}

pub fn serialize<S: Serializer>(path: &Path, s: S) -> Result<S::Ok, S::Error> {
    let stored = match path.to_str() {
        Some(text) => Borrowed::Text(text),
        None => Borrowed::Raw(path.as_os_str()),
    };
    stored.serialize(s)
}

pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<PathBuf, D::Error> {
    Ok(match Owned::deserialize(d)? {
        Owned::Text(text) => PathBuf::from(text),
        Owned::Raw(raw) => PathBuf::from(raw),
    })
}
