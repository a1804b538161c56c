//! The resource identifier value type.

use crate::{UdiEntityType, UdiType, decode_component, encode_entity_type, encode_id};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use url::Url;
use uuid::Uuid;
use vasari_error::{IdentifierError, IdentifierErrorKind, IdentifierResult};

/// Scheme written when an identifier is serialized.
pub const UDI_SCHEME: &str = "umb";

/// The instance part of an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UdiValue {
    /// No instance id
    Open,
    /// A 128-bit id
    ClosedGuid(Uuid),
    /// A percent-encoded, slash-preserving string id
    ClosedString(String),
}

/// A structured resource identifier: `scheme://entity-type[/id]`.
///
/// Immutable once constructed. Equality compares the entity type name, the id
/// variant and the id; the scheme is not part of the identity.
///
/// # Examples
///
/// ```
/// use vasari_core::{Udi, UdiType};
/// use uuid::Uuid;
///
/// let open = Udi::open("media-file").unwrap();
/// assert!(open.is_open());
/// assert_eq!(open.to_string(), "umb://media-file");
///
/// let guid = Uuid::parse_str("6f0a3a1e-9b8c-4c1f-8a2b-6d3e4f5a6b7c").unwrap();
/// let doc = Udi::with_guid("document", guid).unwrap();
/// assert_eq!(doc.guid(), Some(guid));
/// assert_eq!(doc.to_string(), "umb://document/6f0a3a1e9b8c4c1f8a2b6d3e4f5a6b7c");
///
/// let photo = Udi::with_string_id("media-file", "2024/my photo.jpg").unwrap();
/// assert_eq!(photo.kind(), UdiType::ClosedString);
/// assert_eq!(photo.to_string(), "umb://media-file/2024/my%20photo.jpg");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Udi {
    entity_type: String,
    value: UdiValue,
}

impl Udi {
    /// Create an open identifier naming an entity type.
    ///
    /// # Errors
    ///
    /// Returns `EmptyEntityType` if the name is blank.
    #[track_caller]
    pub fn open(entity_type: &str) -> IdentifierResult<Self> {
        Ok(Self {
            entity_type: entity_type_name(entity_type)?,
            value: UdiValue::Open,
        })
    }

    /// Create a closed identifier with a string id.
    ///
    /// The id is given unencoded; it is stored percent-encoded with `/` kept
    /// and outer slashes trimmed.
    ///
    /// # Errors
    ///
    /// Returns `EmptyEntityType` or `EmptyId` if either part is blank, or
    /// `Malformed` if the id contains a `.` or `..` segment.
    #[track_caller]
    pub fn with_string_id(entity_type: &str, id: &str) -> IdentifierResult<Self> {
        let entity_type = entity_type_name(entity_type)?;
        if id.trim_matches('/').trim().is_empty() {
            return Err(IdentifierError::new(IdentifierErrorKind::EmptyId(
                entity_type,
            )));
        }
        let canonical = canonical_id(id).ok_or_else(|| {
            IdentifierError::new(IdentifierErrorKind::Malformed(id.to_string()))
        })?;

        Ok(Self {
            entity_type,
            value: UdiValue::ClosedString(encode_id(canonical)),
        })
    }

    /// Create a closed identifier with a 128-bit id.
    ///
    /// # Errors
    ///
    /// Returns `EmptyEntityType` if the name is blank.
    #[track_caller]
    pub fn with_guid(entity_type: &str, guid: Uuid) -> IdentifierResult<Self> {
        Ok(Self {
            entity_type: entity_type_name(entity_type)?,
            value: UdiValue::ClosedGuid(guid),
        })
    }

    /// Create an open identifier from a descriptor.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEntityTypeForId` unless the descriptor is [`UdiType::Open`].
    #[track_caller]
    pub fn create(entity_type: &UdiEntityType) -> IdentifierResult<Self> {
        expect_kind(entity_type, UdiType::Open, "no id")?;
        Self::open(entity_type.value())
    }

    /// Create a guid identifier from a descriptor.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEntityTypeForId` unless the descriptor is [`UdiType::ClosedGuid`].
    #[track_caller]
    pub fn create_guid(entity_type: &UdiEntityType, guid: Uuid) -> IdentifierResult<Self> {
        expect_kind(entity_type, UdiType::ClosedGuid, "a guid id")?;
        Self::with_guid(entity_type.value(), guid)
    }

    /// Create a string identifier from a descriptor.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEntityTypeForId` unless the descriptor is
    /// [`UdiType::ClosedString`], or `EmptyId` for a blank id.
    #[track_caller]
    pub fn create_string(entity_type: &UdiEntityType, id: &str) -> IdentifierResult<Self> {
        expect_kind(entity_type, UdiType::ClosedString, "a string id")?;
        Self::with_string_id(entity_type.value(), id)
    }

    /// Parse an identifier, failing on malformed input.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` if the input is not an absolute URI with an
    /// authority, or the entity type is missing.
    #[track_caller]
    pub fn parse(value: &str) -> IdentifierResult<Self> {
        Self::try_parse(value).ok_or_else(|| {
            IdentifierError::new(IdentifierErrorKind::Malformed(value.to_string()))
        })
    }

    /// Parse an identifier, returning `None` on malformed input.
    pub fn try_parse(value: &str) -> Option<Self> {
        let url = Url::parse(value).ok()?;
        let host = url.host_str()?;

        let entity_type = decode_component(host);
        if entity_type.trim().is_empty() {
            return None;
        }

        let raw_id = url.path().trim_matches('/');
        if raw_id.is_empty() {
            return Some(Self {
                entity_type: entity_type.into_owned(),
                value: UdiValue::Open,
            });
        }

        let decoded = decode_component(raw_id);
        let id = canonical_id(&decoded)?;

        let value = match Uuid::parse_str(id) {
            Ok(guid) => UdiValue::ClosedGuid(guid),
            Err(_) => UdiValue::ClosedString(encode_id(id)),
        };

        Some(Self {
            entity_type: entity_type.into_owned(),
            value,
        })
    }

    /// The entity type descriptor, with the variant this identifier carries.
    pub fn entity_type(&self) -> UdiEntityType {
        // The stored name is already decoded and non-blank.
        UdiEntityType::from_decoded(self.kind(), self.entity_type.clone())
    }

    /// The decoded entity type name.
    pub fn entity_type_name(&self) -> &str {
        &self.entity_type
    }

    /// The id variant.
    pub fn kind(&self) -> UdiType {
        match self.value {
            UdiValue::Open => UdiType::Open,
            UdiValue::ClosedGuid(_) => UdiType::ClosedGuid,
            UdiValue::ClosedString(_) => UdiType::ClosedString,
        }
    }

    /// The instance part.
    pub fn value(&self) -> &UdiValue {
        &self.value
    }

    /// Whether this identifier names a category rather than an instance.
    pub fn is_open(&self) -> bool {
        self.value == UdiValue::Open
    }

    /// The encoded id; the 32-character no-dash form for guid ids.
    pub fn id(&self) -> Option<Cow<'_, str>> {
        match &self.value {
            UdiValue::Open => None,
            UdiValue::ClosedGuid(guid) => Some(Cow::Owned(guid.simple().to_string())),
            UdiValue::ClosedString(id) => Some(Cow::Borrowed(id)),
        }
    }

    /// The guid, only for guid identifiers.
    pub fn guid(&self) -> Option<Uuid> {
        match self.value {
            UdiValue::ClosedGuid(guid) => Some(guid),
            _ => None,
        }
    }
}

impl fmt::Display for Udi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entity_type = encode_entity_type(&self.entity_type);
        match self.id() {
            Some(id) => write!(f, "{}://{}/{}", UDI_SCHEME, entity_type, id),
            None => write!(f, "{}://{}", UDI_SCHEME, entity_type),
        }
    }
}

impl FromStr for Udi {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Decoded string id in the form serialization preserves: no outer slashes,
/// not blank, no dot segments.
fn canonical_id(id: &str) -> Option<&str> {
    let id = id.trim_matches('/');
    if id.trim().is_empty() || id.split('/').any(|segment| segment == "." || segment == "..") {
        return None;
    }
    Some(id)
}

#[track_caller]
fn entity_type_name(value: &str) -> IdentifierResult<String> {
    UdiEntityType::new(UdiType::Open, value).map(|entity_type| entity_type.value().to_string())
}

#[track_caller]
fn expect_kind(entity_type: &UdiEntityType, expected: UdiType, supplied: &str) -> IdentifierResult<()> {
    if entity_type.kind() != expected {
        return Err(IdentifierError::new(
            IdentifierErrorKind::InvalidEntityTypeForId {
                entity_type: entity_type.value().to_string(),
                expected: entity_type.kind().to_string(),
                supplied: supplied.to_string(),
            },
        ));
    }
    Ok(())
}
