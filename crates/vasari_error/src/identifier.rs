//! Resource identifier error types.

/// Kinds of identifier errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum IdentifierErrorKind {
    /// Input is not a valid identifier
    #[display("Input string \"{}\" is not a valid Udi", _0)]
    Malformed(String),
    /// Entity type name is empty or whitespace
    #[display("Entity type must not be empty")]
    EmptyEntityType,
    /// Closed identifier was given an empty id
    #[display("Closed identifier for '{}' requires a non-empty id", _0)]
    EmptyId(String),
    /// Factory received an id incompatible with the entity type's variant
    #[display("Entity type '{}' is {} and cannot take {}", entity_type, expected, supplied)]
    InvalidEntityTypeForId {
        /// The entity type name
        entity_type: String,
        /// Variant declared by the entity type
        expected: String,
        /// Kind of id that was supplied
        supplied: String,
    },
}

/// Identifier error with location tracking.
///
/// # Examples
///
/// ```
/// use vasari_error::{IdentifierError, IdentifierErrorKind};
///
/// let err = IdentifierError::new(IdentifierErrorKind::Malformed("not a udi".into()));
/// assert!(format!("{}", err).contains("not a valid Udi"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Identifier Error: {} at line {} in {}", kind, line, file)]
pub struct IdentifierError {
    kind: IdentifierErrorKind,
    line: u32,
    file: &'static str,
}

impl IdentifierError {
    /// Create a new identifier error with caller location tracking.
    #[track_caller]
    pub fn new(kind: IdentifierErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &IdentifierErrorKind {
        &self.kind
    }
}

/// Result type for identifier construction and parsing.
pub type IdentifierResult<T> = std::result::Result<T, IdentifierError>;
