//! First-page format validation.
//!
//! Page 1 starts with the 100-byte SQLite header. An unencrypted file begins
//! with the 16-byte magic; for an encrypted file the pager has already
//! decrypted the page and put the magic back, so what is left to judge is
//! whether the rest of the header has the shape SQLite always writes.
//!
//! Header fields checked (offsets into page 1):
//!
//! | Offset | Size | Expected |
//! |--------|------|----------|
//! | 0      | 16   | `"SQLite format 3\0"` |
//! | 16     | 2    | page size (big-endian, `1` means 65536) |
//! | 18     | 1    | write version, 1 or 2 |
//! | 19     | 1    | read version, 1 or 2 |
//! | 21     | 3    | payload fractions `64, 32, 32` |

use crate::error::{CipherliteError, Result};

/// Magic at the start of every unencrypted database file.
pub const SQLITE_MAGIC: &[u8; MAGIC_LENGTH] = b"SQLite format 3\0";

pub const MAGIC_LENGTH: usize = 16;

/// Size of the database header at the start of page 1.
pub const HEADER_LENGTH: usize = 100;

const PAGE_SIZE_OFFSET: usize = 16;
const WRITE_VERSION_OFFSET: usize = 18;
const READ_VERSION_OFFSET: usize = 19;
const PAYLOAD_FRACTIONS_OFFSET: usize = 21;
const PAYLOAD_FRACTIONS: [u8; 3] = [64, 32, 32];

/// Classification of page 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderClass {
    /// Unencrypted page carrying the magic and a sane header.
    PlaintextMagic,
    /// Decrypted page with a recognizable header.
    Decrypted,
    /// Neither: wrong key, missing key, or not a database at all.
    Undecodable,
}

pub fn has_magic(page: &[u8]) -> bool {
    page.len() >= MAGIC_LENGTH && &page[..MAGIC_LENGTH] == SQLITE_MAGIC
}

/// Page size stored in a header, if it is a valid SQLite page size.
pub fn header_page_size(header: &[u8]) -> Option<usize> {
    if header.len() < PAGE_SIZE_OFFSET + 2 {
        return None;
    }
    let raw = u16::from_be_bytes([header[PAGE_SIZE_OFFSET], header[PAGE_SIZE_OFFSET + 1]]);
    let size = if raw == 1 { 65536 } else { usize::from(raw) };
    if size >= 512 && size.is_power_of_two() {
        Some(size)
    } else {
        None
    }
}

/// Page size of an unencrypted file, read from its header prefix.
///
/// `None` if the prefix does not start with the magic or the size is invalid.
pub fn plaintext_page_size(prefix: &[u8]) -> Option<usize> {
    if !has_magic(prefix) {
        return None;
    }
    header_page_size(prefix)
}

fn header_shape_ok(page: &[u8], expected_page_size: usize) -> bool {
    if page.len() < HEADER_LENGTH {
        return false;
    }
    header_page_size(page) == Some(expected_page_size)
        && (1..=2).contains(&page[WRITE_VERSION_OFFSET])
        && (1..=2).contains(&page[READ_VERSION_OFFSET])
        && page[PAYLOAD_FRACTIONS_OFFSET..PAYLOAD_FRACTIONS_OFFSET + 3] == PAYLOAD_FRACTIONS
}

/// Classify page 1 as seen after decryption (keyed) or passthrough (unkeyed).
pub fn classify_first_page(page: &[u8], keyed: bool, expected_page_size: usize) -> HeaderClass {
    let shape_ok = header_shape_ok(page, expected_page_size);
    match (keyed, has_magic(page) && shape_ok) {
        (false, true) => HeaderClass::PlaintextMagic,
        (true, true) => HeaderClass::Decrypted,
        _ => HeaderClass::Undecodable,
    }
}

/// Classify page 1 and map an undecodable page to `NotADatabase`.
pub fn validate_first_page(
    page: &[u8],
    keyed: bool,
    expected_page_size: usize,
) -> Result<HeaderClass> {
    match classify_first_page(page, keyed, expected_page_size) {
        HeaderClass::Undecodable => Err(CipherliteError::NotADatabase),
        class => Ok(class),
    }
}
