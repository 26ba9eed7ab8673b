//! Parser for the composite address data object.
//!
//! The card carries the address as one binary blob of tag/length/value
//! segments in a fixed order: tag `0x01` (street and number), `0x02`
//! (postal code), `0x03` (municipality). Each segment is one tag byte,
//! one length byte, then that many bytes of UTF-8 text.
//!
//! Segments are read strictly in order from offset 0. Decoding stops as
//! soon as the expected tag is not found at the current offset; there is
//! no skipping or resynchronization. A truncated or reordered blob
//! therefore yields a record with a strict prefix of the fields
//! populated, and never an error.

use super::AddressRecord;

const TAG_STREET_AND_NUMBER: u8 = 0x01;
const TAG_ZIP: u8 = 0x02;
const TAG_MUNICIPALITY: u8 = 0x03;

/// Bounds-checked reader over the raw blob.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn take_byte(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let bytes = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }
}

/// Decodes the composite address blob. Total: malformed input yields a
/// partial (possibly empty) record.
#[must_use]
pub fn parse_address(blob: &[u8]) -> AddressRecord {
    let mut cursor = Cursor::new(blob);
    let mut record = AddressRecord::default();

    let segments: [(u8, fn(&mut AddressRecord) -> &mut Option<String>); 3] = [
        (TAG_STREET_AND_NUMBER, |r| &mut r.address_street_and_number),
        (TAG_ZIP, |r| &mut r.address_zip),
        (TAG_MUNICIPALITY, |r| &mut r.address_municipality),
    ];

    for (tag, slot) in segments {
        let Some(text) = read_segment(&mut cursor, tag) else {
            break;
        };
        // Invalid UTF-8 or whitespace-only text drops the field but the
        // segment itself was structurally sound, so keep walking.
        *slot(&mut record) = text;
    }

    record
}

/// Reads one tag/length/value segment.
///
/// The outer `Option` is the structural verdict: `None` means the walk
/// must stop (unexpected tag or truncated segment). The inner `Option`
/// is the decoded text, absent when the bytes are not acceptable UTF-8.
fn read_segment(cursor: &mut Cursor<'_>, expected_tag: u8) -> Option<Option<String>> {
    if cursor.peek() != Some(expected_tag) {
        return None;
    }
    cursor.take_byte();
    let len = cursor.take_byte()?;
    let bytes = cursor.take(len as usize)?;
    Some(decode_segment_text(bytes))
}

fn decode_segment_text(bytes: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(bytes).ok()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
