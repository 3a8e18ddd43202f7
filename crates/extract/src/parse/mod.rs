//! Per-format parsers. Each one only has to get the title and author out of
//! the container; cleaning up the values happens in [`crate::extract`].

mod epub;
mod mobi;
mod pdf;

pub(crate) use self::epub::extract as epub;
pub(crate) use self::mobi::extract as mobi;
pub(crate) use self::pdf::extract as pdf;
use crate::ExtractedMetadata;

pub(crate) type Raw = ExtractedMetadata;

#[cfg(test)]
pub(crate) use self::{epub::tests::build as epub_fixture, mobi::tests::build as mobi_fixture, pdf::tests::build as pdf_fixture};
