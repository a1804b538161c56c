//! Errors raised by the in-flight request registry.

/// Ways a shared computation can end without producing a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum CoalesceErrorKind {
    /// The computation panicked
    #[display("In-flight computation for '{}' panicked: {}", key, message)]
    Panicked {
        /// Registry key of the computation
        key: String,
        /// Panic payload, when it was a string
        message: String,
    },
    /// The computation's task was aborted by the runtime
    #[display("In-flight computation for '{}' was aborted", _0)]
    Aborted(String),
}

/// Coalescing error with location tracking.
///
/// Cloneable so that every waiter attached to a ticket observes the same failure.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Coalesce Error: {} at line {} in {}", kind, line, file)]
pub struct CoalesceError {
    /// The kind of error that occurred
    pub kind: CoalesceErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl CoalesceError {
    /// Create a new coalescing error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: CoalesceErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
