//! Error types for Vasari.
//!
//! This crate provides the foundation error types used throughout the Vasari workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern for clean error handling:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! Missing assets and unparseable identifiers on the lenient paths are not errors:
//! they surface as `Option::None` at the call site.
//!
//! # Examples
//!
//! ```
//! use vasari_error::{StorageError, StorageErrorKind, VasariResult};
//!
//! fn read_asset() -> VasariResult<Vec<u8>> {
//!     Err(StorageError::new(StorageErrorKind::FileRead("a/abc.jpg".into())))?
//! }
//!
//! match read_asset() {
//!     Ok(data) => println!("Got {} bytes", data.len()),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod coalesce;
mod config;
mod error;
mod identifier;
mod server;
mod storage;

pub use builder::{BuilderError, BuilderErrorKind};
pub use coalesce::{CoalesceError, CoalesceErrorKind};
pub use config::ConfigError;
pub use error::{VasariError, VasariErrorKind, VasariResult};
pub use identifier::{IdentifierError, IdentifierErrorKind, IdentifierResult};
pub use server::{ServerError, ServerErrorKind};
pub use storage::{StorageError, StorageErrorKind, StorageResult};
