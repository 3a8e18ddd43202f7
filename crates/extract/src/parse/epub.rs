use std::io::Cursor;

use ::epub::doc::EpubDoc;

use super::Raw;
use crate::BookFormat;
use crate::error::{ErrorKind, Result};

/// Dublin Core `title` and `creator` from the package document.
pub(crate) fn extract(bytes: &[u8]) -> Result<Raw> {
    let doc = EpubDoc::from_reader(Cursor::new(bytes))
        .map_err(|e| ErrorKind::malformed(BookFormat::Epub, e))?;
    Ok(Raw {
        title: doc.mdata("title").map(|m| m.value.clone()),
        author: doc.mdata("creator").map(|m| m.value.clone()),
    })
}
