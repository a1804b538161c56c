//! Entity type descriptors.

use crate::decode_component;
use vasari_error::{IdentifierError, IdentifierErrorKind, IdentifierResult};

/// Entity type name for stored media files.
pub const MEDIA_FILE: &str = "media-file";

/// Shape of the id an entity type carries.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::EnumIter,
    derive_more::Display,
)]
pub enum UdiType {
    /// Names the category only, no instance id
    #[display("open")]
    Open,
    /// Instance id is a 128-bit identifier
    #[display("closed (guid)")]
    ClosedGuid,
    /// Instance id is an arbitrary string
    #[display("closed (string)")]
    ClosedString,
}

/// An entity type name paired with the variant of id it accepts.
///
/// The name is stored percent-decoded.
///
/// # Examples
///
/// ```
/// use vasari_core::{UdiEntityType, UdiType};
///
/// let media = UdiEntityType::media_file();
/// assert_eq!(media.value(), "media-file");
/// assert_eq!(media.kind(), UdiType::ClosedString);
///
/// let decoded = UdiEntityType::new(UdiType::Open, "media%20folder").unwrap();
/// assert_eq!(decoded.value(), "media folder");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UdiEntityType {
    kind: UdiType,
    value: String,
}

impl UdiEntityType {
    /// Create a descriptor from a (possibly percent-encoded) name.
    ///
    /// # Errors
    ///
    /// Returns `EmptyEntityType` if the name is empty or whitespace.
    #[track_caller]
    pub fn new(kind: UdiType, value: &str) -> IdentifierResult<Self> {
        if value.trim().is_empty() {
            return Err(IdentifierError::new(IdentifierErrorKind::EmptyEntityType));
        }

        Ok(Self {
            kind,
            value: decode_component(value).into_owned(),
        })
    }

    pub(crate) fn from_decoded(kind: UdiType, value: String) -> Self {
        Self { kind, value }
    }

    /// The `media-file` entity type, which carries string ids.
    pub fn media_file() -> Self {
        Self {
            kind: UdiType::ClosedString,
            value: MEDIA_FILE.to_string(),
        }
    }

    /// Variant of id this entity type carries.
    pub fn kind(&self) -> UdiType {
        self.kind
    }

    /// Decoded entity type name.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether this descriptor names the given entity type, ignoring the variant.
    pub fn is(&self, name: &str) -> bool {
        self.value == name
    }
}
