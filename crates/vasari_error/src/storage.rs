//! Storage error types.

/// Kinds of storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum StorageErrorKind {
    /// Failed to create storage directory
    #[display("Failed to create storage directory: {}", _0)]
    DirectoryCreation(String),
    /// Failed to write file
    #[display("Failed to write file: {}", _0)]
    FileWrite(String),
    /// Failed to read file
    #[display("Failed to read file: {}", _0)]
    FileRead(String),
    /// Remote object store rejected or failed a read
    #[display("Remote read failed: {}", _0)]
    RemoteRead(String),
    /// Remote object store rejected or failed a write
    #[display("Remote write failed: {}", _0)]
    RemoteWrite(String),
    /// Invalid storage path
    #[display("Invalid storage path: {}", _0)]
    InvalidPath(String),
    /// Invalid storage configuration
    #[display("Invalid configuration: {}", _0)]
    InvalidConfig(String),
    /// Operation was canceled before or during I/O
    #[display("Operation canceled: {}", _0)]
    Canceled(String),
}

/// Storage error with location tracking.
///
/// # Examples
///
/// ```
/// use vasari_error::{StorageError, StorageErrorKind};
///
/// let err = StorageError::new(StorageErrorKind::FileRead("/path/to/file".to_string()));
/// assert!(format!("{}", err).contains("Failed to read file"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Storage Error: {} at line {} in {}", kind, line, file)]
pub struct StorageError {
    /// The kind of error that occurred
    pub kind: StorageErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StorageError {
    /// Create a new storage error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StorageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Create a cancellation error for the named operation.
    #[track_caller]
    pub fn canceled(operation: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Canceled(operation.into()))
    }

    /// Whether this error reports a cancellation rather than a failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self.kind, StorageErrorKind::Canceled(_))
    }
}

/// Result type for storage backend operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
