//! Storage entry snapshot and its content sources.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::fmt;
use std::io;
use std::sync::Arc;
use vasari_error::StorageResult;

/// A readable byte stream over an entry's content.
pub type ContentStream = BoxStream<'static, io::Result<Bytes>>;

/// Source of an entry's bytes.
///
/// Each call to [`EntryContent::open`] yields an independent stream, so several
/// readers can consume the same entry concurrently.
#[async_trait::async_trait]
pub trait EntryContent: Send + Sync {
    /// Open a fresh stream over the content.
    async fn open(&self) -> StorageResult<ContentStream>;
}

/// Snapshot of one stored asset.
///
/// Metadata is captured when the entry is fetched and does not change afterwards.
#[derive(Clone, Getters)]
pub struct StorageEntry {
    /// Name of the asset, without any sharding directories
    name: String,
    /// MIME type
    content_type: String,
    /// Length in bytes
    content_length: u64,
    /// Last modification time
    last_modified: DateTime<Utc>,
    #[getter(skip)]
    content: Arc<dyn EntryContent>,
}

impl StorageEntry {
    /// Create an entry backed by an arbitrary content source.
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        content_length: u64,
        last_modified: DateTime<Utc>,
        content: Arc<dyn EntryContent>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            content_length,
            last_modified,
            content,
        }
    }

    /// Create an entry over an in-memory buffer.
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        last_modified: DateTime<Utc>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self::new(
            name,
            content_type,
            data.len() as u64,
            last_modified,
            Arc::new(BytesContent::new(data)),
        )
    }

    /// Open a stream over the entry's content.
    pub async fn open(&self) -> StorageResult<ContentStream> {
        self.content.open().await
    }
}

impl fmt::Debug for StorageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageEntry")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("last_modified", &self.last_modified)
            .finish_non_exhaustive()
    }
}

/// Content held in memory.
#[derive(Debug, Clone)]
pub struct BytesContent {
    data: Bytes,
}

impl BytesContent {
    /// Wrap a buffer.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait::async_trait]
impl EntryContent for BytesContent {
    async fn open(&self) -> StorageResult<ContentStream> {
        let data = self.data.clone();
        Ok(futures::stream::once(async move { Ok(data) }).boxed())
    }
}
