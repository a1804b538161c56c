//! Top-level error wrapper types.

use crate::{
    BuilderError, CoalesceError, ConfigError, IdentifierError, ServerError, StorageError,
};

/// Every error a Vasari crate can surface to its caller.
///
/// # Examples
///
/// ```
/// use vasari_error::{ConfigError, VasariError};
///
/// let err: VasariError = ConfigError::new("missing [storage] section").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum VasariErrorKind {
    /// Identifier parsing or construction error
    #[from(IdentifierError)]
    Identifier(IdentifierError),
    /// Storage backend error
    #[from(StorageError)]
    Storage(StorageError),
    /// In-flight registry error
    #[from(CoalesceError)]
    Coalesce(CoalesceError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Builder error
    #[from(BuilderError)]
    Builder(BuilderError),
    /// Server error
    #[from(ServerError)]
    Server(ServerError),
}

/// Vasari error with kind discrimination.
///
/// # Examples
///
/// ```
/// use vasari_error::{ConfigError, VasariResult};
///
/// fn might_fail() -> VasariResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Vasari Error: {}", _0)]
pub struct VasariError(Box<VasariErrorKind>);

impl VasariError {
    /// Create a new error from a kind.
    pub fn new(kind: VasariErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &VasariErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to VasariErrorKind
impl<T> From<T> for VasariError
where
    T: Into<VasariErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Vasari operations.
pub type VasariResult<T> = std::result::Result<T, VasariError>;
