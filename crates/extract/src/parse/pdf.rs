use lopdf::{Dictionary, Document, Object};

use super::Raw;
use crate::BookFormat;
use crate::error::{ErrorKind, Result};

/// `/Title` and `/Author` from the trailer's document information dictionary.
pub(crate) fn extract(bytes: &[u8]) -> Result<Raw> {
    let doc = Document::load_mem(bytes).map_err(|e| ErrorKind::malformed(BookFormat::Pdf, e))?;
    let Some(info) = info_dictionary(&doc) else {
        tracing::debug!("PDF has no document information dictionary");
        return Ok(Raw::default());
    };
    Ok(Raw {
        title: text_field(info, b"Title"),
        author: text_field(info, b"Author"),
    })
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    let info = doc.trailer.get(b"Info").ok()?;
    match info.as_reference() {
        Ok(id) => doc.get_object(id).ok()?.as_dict().ok(),
        Err(_) => info.as_dict().ok(),
    }
}

fn text_field(info: &Dictionary, key: &[u8]) -> Option<String> {
    match info.get(key).ok()? {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

/// PDF text strings are UTF-16BE when they start with a byte order mark,
/// otherwise PDFDocEncoding, which agrees with Latin-1 everywhere that
/// matters for titles.
fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
            String::from_utf16_lossy(&units)
        },
        _ => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::dictionary;

    /// Build a minimal, valid single-catalog PDF with the given information dictionary.
    pub(crate) fn build(info: Option<Dictionary>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        if let Some(info) = info {
            let info_id = doc.add_object(info);
            doc.trailer.set("Info", info_id);
        }
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_title_and_author() {
        let bytes = build(Some(dictionary! {
            "Title" => Object::string_literal("Dune"),
            "Author" => Object::string_literal("Frank Herbert"),
        }));
        let raw = extract(&bytes).unwrap();
        assert_eq!(raw.title.as_deref(), Some("Dune"));
        assert_eq!(raw.author.as_deref(), Some("Frank Herbert"));
    }

    #[test]
    fn test_no_info_dictionary() {
        let raw = extract(&build(None)).unwrap();
        assert_eq!(raw, Raw::default());
    }

    #[test]
    fn test_decode_utf16() {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in "Les Misérables".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_text_string(&bytes), "Les Misérables");
    }

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode_text_string(b"Caf\xe9"), "Café");
    }

    #[test]
    fn test_not_a_pdf() {
        let err = extract(b"This is not a PDF").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed { format: BookFormat::Pdf, .. }));
    }
}
