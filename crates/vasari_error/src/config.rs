//! Errors raised while layering `vasari.toml`, user overrides and
//! `VASARI__*` environment variables into a server configuration.

use std::fmt::Display;

/// The layered configuration could not be read or did not describe a usable
/// server, such as a storage backend other than `filesystem` or `blob`.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", message, line, file)]
pub struct ConfigError {
    /// What was wrong with the configuration
    pub message: String,
    /// Line number where the error was raised
    pub line: u32,
    /// File where the error was raised
    pub file: &'static str,
}

impl ConfigError {
    /// Create a configuration error at the caller's location.
    ///
    /// ```
    /// use vasari_error::ConfigError;
    ///
    /// let err = ConfigError::new("Unknown storage backend 'tape'");
    /// assert_eq!(err.message, "Unknown storage backend 'tape'");
    /// assert!(err.to_string().starts_with("Configuration Error: Unknown storage backend"));
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }

    /// A configuration source, named by `origin`, failed to load.
    #[track_caller]
    pub fn source_failed(origin: impl Display, cause: impl Display) -> Self {
        Self::new(format!("Failed to load configuration from {}: {}", origin, cause))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_where_loading_failed() {
        let err = ConfigError::source_failed("/etc/vasari/vasari.toml", "expected `=`");

        assert_eq!(
            err.message,
            "Failed to load configuration from /etc/vasari/vasari.toml: expected `=`"
        );
        assert!(err.file.ends_with("config.rs"));
    }
}
