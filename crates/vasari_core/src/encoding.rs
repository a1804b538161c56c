//! Percent-encoding rules for identifier components.
//!
//! Ids are escaped with the RFC 3986 unreserved set kept literal, then `%2F` is
//! restored to `/` so that path-like ids keep their shape inside the URI text.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::borrow::Cow;

/// Everything except `ALPHA / DIGIT / "-" / "." / "_" / "~"`.
const DATA: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode an id, keeping `/` literal.
///
/// ```
/// use vasari_core::encode_id;
///
/// assert_eq!(encode_id("2024/my photo.jpg"), "2024/my%20photo.jpg");
/// ```
pub fn encode_id(id: &str) -> String {
    utf8_percent_encode(id, DATA)
        .to_string()
        .replace("%2F", "/")
}

/// Percent-encode an entity type name for use as the identifier authority.
pub fn encode_entity_type(value: &str) -> String {
    utf8_percent_encode(value, DATA).to_string()
}

/// Percent-decode one identifier component.
///
/// Invalid UTF-8 sequences are replaced rather than rejected.
///
/// ```
/// use vasari_core::decode_component;
///
/// assert_eq!(decode_component("my%20photo.jpg"), "my photo.jpg");
/// ```
pub fn decode_component(value: &str) -> Cow<'_, str> {
    percent_decode_str(value).decode_utf8_lossy()
}
