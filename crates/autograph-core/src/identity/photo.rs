//! Photo encoding.
//!
//! The card stores the holder's photo as raw JPEG bytes; the UI consumes
//! it as a data URI.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Renders raw JPEG bytes as a `data:image/jpeg;base64,...` URI.
#[must_use]
pub fn photo_data_uri(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg))
}
