//! Vasari - media files by entity identifier
//!
//! Vasari stores media assets under flat names and serves them over HTTP to
//! requests that address them by identifier (`umb://media-file/abc.jpg`).
//!
//! # Features
//!
//! - **Identifiers**: Parse, build and format `umb://` entity identifiers
//! - **Storage**: Sharded filesystem and remote blob container backends
//! - **Coalescing**: Concurrent requests for one asset share a single fetch
//! - **Resolution**: Axum middleware with conditional requests and caching headers
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use vasari::{ApacheContentTypeProvider, MediaFileResolver, ShardedFileStorage, router};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = ShardedFileStorage::new(
//!     "/srv/vasari/media",
//!     Arc::new(ApacheContentTypeProvider::bundled()),
//! )?;
//! let resolver = MediaFileResolver::new(Arc::new(storage));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, router(Arc::new(resolver))).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Cargo Features
//!
//! - `server` (default) - Resolution middleware, configuration and server
//!
//! # Architecture
//!
//! - `vasari_error` - Error types
//! - `vasari_core` - Entity identifiers
//! - `vasari_storage` - Storage backends
//! - `vasari_cache` - Single-flight request coalescing
//! - `vasari_server` - Resolution middleware and server
//!
//! This crate (`vasari`) re-exports everything for convenience.

pub use vasari_cache::*;
pub use vasari_core::*;
pub use vasari_error::*;
pub use vasari_storage::*;

#[cfg(feature = "server")]
pub use vasari_server::*;
