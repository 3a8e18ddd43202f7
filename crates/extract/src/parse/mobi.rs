//! Mobipocket files are a PalmDB database. Record 0 holds a PalmDOC header,
//! then the MOBI header, then (optionally) an EXTH block of typed metadata
//! records.

use super::Raw;
use crate::BookFormat;
use crate::error::{ErrorKind, Result};

const PALMDB_HEADER_LEN: usize = 78;
const PALMDB_TYPE: &[u8] = b"BOOKMOBI";
const PALMDOC_HEADER_LEN: usize = 16;
const EXTH_FLAG: u32 = 0x40;
const EXTH_AUTHOR: u32 = 100;
const EXTH_UPDATED_TITLE: u32 = 503;
const ENCODING_UTF8: u32 = 65001;

/// Title and author from the EXTH block, falling back to the MOBI header's
/// full name for the title.
pub(crate) fn extract(bytes: &[u8]) -> Result<Raw> {
    let malformed = |reason: &str| ErrorKind::malformed(BookFormat::Mobi, reason);

    if bytes.len() < PALMDB_HEADER_LEN || &bytes[60..68] != PALMDB_TYPE {
        exn::bail!(malformed("not a BOOKMOBI database"));
    }
    if u16_at(bytes, 76).unwrap_or(0) == 0 {
        exn::bail!(malformed("database has no records"));
    }
    let record0 = u32_at(bytes, PALMDB_HEADER_LEN).ok_or_else(|| malformed("truncated record list"))? as usize;
    let mobi = record0 + PALMDOC_HEADER_LEN;
    if bytes.get(mobi..mobi + 4) != Some(b"MOBI".as_slice()) {
        exn::bail!(malformed("record 0 has no MOBI header"));
    }
    let header_len = u32_at(bytes, mobi + 4).ok_or_else(|| malformed("truncated MOBI header"))? as usize;
    if bytes.len() < mobi + header_len.max(116) {
        exn::bail!(malformed("truncated MOBI header"));
    }
    let utf8 = u32_at(bytes, mobi + 12) == Some(ENCODING_UTF8);
    let decode = |raw: &[u8]| match utf8 {
        true => String::from_utf8_lossy(raw).into_owned(),
        // CP1252, near enough.
        false => raw.iter().map(|&b| char::from(b)).collect(),
    };

    let full_name = match (u32_at(bytes, record0 + 84), u32_at(bytes, record0 + 88)) {
        (Some(offset), Some(len)) => {
            let start = record0 + offset as usize;
            bytes.get(start..start + len as usize).map(decode)
        },
        _ => None,
    };

    let mut raw = Raw::default();
    let has_exth = u32_at(bytes, mobi + 112).is_some_and(|flags| flags & EXTH_FLAG != 0);
    if has_exth {
        let exth = mobi + header_len;
        if bytes.get(exth..exth + 4) != Some(b"EXTH".as_slice()) {
            exn::bail!(malformed("EXTH flag set but no EXTH block"));
        }
        let count = u32_at(bytes, exth + 8).ok_or_else(|| malformed("truncated EXTH header"))?;
        let mut cursor = exth + 12;
        for _ in 0..count {
            let (Some(kind), Some(len)) = (u32_at(bytes, cursor), u32_at(bytes, cursor + 4)) else {
                exn::bail!(malformed("truncated EXTH record"));
            };
            let len = len as usize;
            let Some(data) = bytes.get(cursor + 8..cursor + len.max(8)) else {
                exn::bail!(malformed("EXTH record overruns file"));
            };
            match kind {
                EXTH_AUTHOR if raw.author.is_none() => raw.author = Some(decode(data)),
                EXTH_UPDATED_TITLE if raw.title.is_none() => raw.title = Some(decode(data)),
                _ => {},
            }
            cursor += len.max(8);
        }
    }
    if raw.title.as_deref().is_none_or(|t| t.trim().is_empty()) {
        raw.title = full_name;
    }
    Ok(raw)
}

fn u16_at(bytes: &[u8], offset: usize) -> Option<u16> {
    bytes.get(offset..offset + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

fn u32_at(bytes: &[u8], offset: usize) -> Option<u32> {
    bytes.get(offset..offset + 4).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const MOBI_HEADER_LEN: usize = 232;

    /// Build a single-record MOBI file with the given full name and EXTH records.
    pub(crate) fn build(full_name: &str, exth: &[(u32, &str)]) -> Vec<u8> {
        let mut exth_block = Vec::new();
        if !exth.is_empty() {
            let mut records = Vec::new();
            for (kind, value) in exth {
                records.extend_from_slice(&kind.to_be_bytes());
                records.extend_from_slice(&((value.len() + 8) as u32).to_be_bytes());
                records.extend_from_slice(value.as_bytes());
            }
            exth_block.extend_from_slice(b"EXTH");
            exth_block.extend_from_slice(&((records.len() + 12) as u32).to_be_bytes());
            exth_block.extend_from_slice(&(exth.len() as u32).to_be_bytes());
            exth_block.extend_from_slice(&records);
        }

        let mut record0 = vec![0u8; PALMDOC_HEADER_LEN + MOBI_HEADER_LEN];
        let mobi = PALMDOC_HEADER_LEN;
        record0[mobi..mobi + 4].copy_from_slice(b"MOBI");
        record0[mobi + 4..mobi + 8].copy_from_slice(&(MOBI_HEADER_LEN as u32).to_be_bytes());
        record0[mobi + 12..mobi + 16].copy_from_slice(&ENCODING_UTF8.to_be_bytes());
        let flags: u32 = if exth.is_empty() { 0 } else { EXTH_FLAG };
        record0[mobi + 112..mobi + 116].copy_from_slice(&flags.to_be_bytes());
        let name_offset = (record0.len() + exth_block.len()) as u32;
        record0[84..88].copy_from_slice(&name_offset.to_be_bytes());
        record0[88..92].copy_from_slice(&(full_name.len() as u32).to_be_bytes());
        record0.extend_from_slice(&exth_block);
        record0.extend_from_slice(full_name.as_bytes());
        record0.extend_from_slice(&[0, 0]);

        let mut file = vec![0u8; PALMDB_HEADER_LEN];
        file[..9].copy_from_slice(b"test-book");
        file[60..68].copy_from_slice(PALMDB_TYPE);
        file[76..78].copy_from_slice(&1u16.to_be_bytes());
        let record0_offset = (PALMDB_HEADER_LEN + 8 + 2) as u32;
        file.extend_from_slice(&record0_offset.to_be_bytes());
        file.extend_from_slice(&[0; 4]);
        file.extend_from_slice(&[0; 2]);
        file.extend_from_slice(&record0);
        file
    }

    #[test]
    fn test_exth_title_and_author() {
        let bytes = build("Neuromancer", &[(EXTH_AUTHOR, "William Gibson"), (EXTH_UPDATED_TITLE, "Neuromancer (Revised)")]);
        let raw = extract(&bytes).unwrap();
        assert_eq!(raw.title.as_deref(), Some("Neuromancer (Revised)"));
        assert_eq!(raw.author.as_deref(), Some("William Gibson"));
    }

    #[test]
    fn test_full_name_fallback() {
        let bytes = build("Neuromancer", &[(EXTH_AUTHOR, "William Gibson")]);
        let raw = extract(&bytes).unwrap();
        assert_eq!(raw.title.as_deref(), Some("Neuromancer"));
        assert_eq!(raw.author.as_deref(), Some("William Gibson"));
    }

    #[test]
    fn test_no_exth() {
        let raw = extract(&build("Count Zero", &[])).unwrap();
        assert_eq!(raw.title.as_deref(), Some("Count Zero"));
        assert_eq!(raw.author, None);
    }

    #[test]
    fn test_not_a_mobi() {
        let err = extract(b"This is not a MOBI").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed { format: BookFormat::Mobi, .. }));
    }

    #[test]
    fn test_truncated() {
        let bytes = build("Neuromancer", &[(EXTH_AUTHOR, "William Gibson")]);
        let err = extract(&bytes[..PALMDB_HEADER_LEN + 40]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed { format: BookFormat::Mobi, .. }));
    }
}
