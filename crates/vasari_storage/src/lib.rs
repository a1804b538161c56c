//! Media storage backends for Vasari.
//!
//! Assets are addressed by name through the [`MediaStorage`] trait, which has
//! two implementations:
//!
//! - [`ShardedFileStorage`]: local disk, one directory level per character of
//!   the name's stem (see [`shard_path`])
//! - [`RemoteBlobStorage`]: a remote object store behind the [`BlobContainer`]
//!   trait, with [`HttpBlobContainer`] for Azure Blob Storage and
//!   [`InMemoryBlobContainer`] for tests
//!
//! A fetched [`StorageEntry`] is an immutable snapshot whose content can be
//! opened as a byte stream any number of times.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Utc;
//! use tokio_util::sync::CancellationToken;
//! use vasari_storage::{ApacheContentTypeProvider, MediaStorage, ShardedFileStorage, StorageEntry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = ShardedFileStorage::new(
//!     "/tmp/vasari-media",
//!     Arc::new(ApacheContentTypeProvider::bundled()),
//! )?;
//! let cancel = CancellationToken::new();
//!
//! let entry = StorageEntry::from_bytes("abc.jpg", "image/jpeg", Utc::now(), vec![0u8; 10]);
//! storage.put(&entry, &cancel).await?;
//!
//! let stored = storage.get("abc.jpg", &cancel).await?.expect("stored");
//! assert_eq!(*stored.content_length(), 10);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod blob;
mod content_type;
mod entry;
mod filesystem;
mod http_blob;
mod sharding;
mod storage;

pub use blob::{BlobContainer, BlobProperties, InMemoryBlobContainer, RemoteBlobStorage};
pub use content_type::{ApacheContentTypeProvider, ContentTypeProvider, DEFAULT_CONTENT_TYPE};
pub use entry::{BytesContent, ContentStream, EntryContent, StorageEntry};
pub use filesystem::{
    FileSystemStorageConfig, FileSystemStorageConfigBuilder, ShardedFileStorage, resolve_root,
};
pub use http_blob::{
    BLOB_API_VERSION, BlobStorageConfig, BlobStorageConfigBuilder, HttpBlobContainer,
};
pub use sharding::{PLACEHOLDER, decode_name, shard_path};
pub use storage::MediaStorage;
pub use vasari_error::{StorageError, StorageErrorKind, StorageResult};
