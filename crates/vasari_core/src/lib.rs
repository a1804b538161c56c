//! Resource identifiers for Vasari.
//!
//! A [`Udi`] names a logical asset independently of where it is stored:
//!
//! - **Open**: `umb://media-file` names an entity-type category
//! - **Closed (string id)**: `umb://media-file/2024/abc.jpg`
//! - **Closed (guid id)**: `umb://document/6f0a3a1e9b8c4c1f8a2b6d3e4f5a6b7c`
//!
//! # Example
//!
//! ```
//! use vasari_core::{Udi, UdiType};
//!
//! let udi = Udi::parse("umb://media-file/abc.jpg").unwrap();
//! assert_eq!(udi.entity_type().kind(), UdiType::ClosedString);
//! assert_eq!(udi.id().as_deref(), Some("abc.jpg"));
//! assert_eq!(udi.to_string(), "umb://media-file/abc.jpg");
//!
//! // Lenient parsing never fails
//! assert!(Udi::try_parse("not a udi").is_none());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod encoding;
mod entity_type;
mod udi;

pub use encoding::{decode_component, encode_entity_type, encode_id};
pub use entity_type::{MEDIA_FILE, UdiEntityType, UdiType};
pub use udi::{UDI_SCHEME, Udi, UdiValue};
pub use vasari_error::{IdentifierError, IdentifierErrorKind, IdentifierResult};
