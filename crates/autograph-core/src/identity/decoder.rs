//! Pure decoder from raw card data objects to an identity record.
//!
//! Total over all inputs: a field that fails to decode is omitted, never
//! populated with garbage, and the decoder itself never fails. Unknown
//! labels are dropped silently.

use crate::token::{ADDRESS_FILE_LABEL, DataObject};

use super::address::parse_address;
use super::{CardIdentityRecord, IdentityField};

/// Decodes a card's data objects into a [`CardIdentityRecord`].
///
/// Ordinary fields must be valid UTF-8 with no replacement marker and
/// non-empty after trimming; the composite `ADDRESS_FILE` blob goes
/// through the tag/length/value parser. Later objects with the same label
/// overwrite earlier ones, matching middleware enumeration order.
#[must_use]
pub fn decode_card_data(objects: &[DataObject]) -> CardIdentityRecord {
    let mut record = CardIdentityRecord::default();

    for object in objects {
        if object.label == ADDRESS_FILE_LABEL {
            record.address = parse_address(&object.value);
        } else if let Some(field) = IdentityField::from_label(&object.label) {
            if let Some(text) = decode_text(&object.value) {
                field.set(&mut record, text);
            }
        }
    }

    record
}

/// Decodes one ordinary text field.
///
/// Accepts the value only if it is valid UTF-8, carries no replacement
/// marker, and is non-empty after trimming whitespace.
fn decode_text(raw: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(raw).ok()?;
    if text.contains('\u{FFFD}') {
        return None;
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
