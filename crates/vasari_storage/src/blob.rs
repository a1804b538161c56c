//! Remote object storage backend.
//!
//! [`RemoteBlobStorage`] adapts any [`BlobContainer`] to [`MediaStorage`]. The
//! container abstracts the remote blob API so the backend can run against a
//! real service ([`crate::HttpBlobContainer`]) or a process-local map
//! ([`InMemoryBlobContainer`]).

use crate::storage::ensure_active;
use crate::{ContentStream, EntryContent, MediaStorage, StorageEntry, decode_name};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use derive_getters::Getters;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vasari_error::{StorageError, StorageErrorKind, StorageResult};

/// Metadata the remote store reports for a blob.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct BlobProperties {
    /// MIME type recorded at upload
    content_type: String,
    /// Length in bytes
    content_length: u64,
    /// Last modification time
    last_modified: DateTime<Utc>,
}

impl BlobProperties {
    /// Bundle blob metadata.
    pub fn new(
        content_type: impl Into<String>,
        content_length: u64,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            content_type: content_type.into(),
            content_length,
            last_modified,
        }
    }
}

/// A container of named blobs in a remote object store.
#[async_trait::async_trait]
pub trait BlobContainer: Send + Sync {
    /// Whether the blob exists.
    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Blob metadata, `None` if the blob does not exist.
    async fn properties(&self, name: &str) -> StorageResult<Option<BlobProperties>>;

    /// Stream the blob's content.
    async fn download(&self, name: &str) -> StorageResult<ContentStream>;

    /// Create or overwrite a blob.
    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        content_length: u64,
        content: ContentStream,
    ) -> StorageResult<()>;

    /// Delete the blob; `true` if it existed.
    async fn delete_if_exists(&self, name: &str) -> StorageResult<bool>;
}

/// Storage backend that delegates to a remote blob container.
///
/// Names are decoded the same way the filesystem backend decodes them, so an
/// encoded request name finds the blob stored under its plain name. Reads check
/// existence first, so a miss costs a single round trip. Entries are not
/// revalidated against the remote store after they are fetched.
pub struct RemoteBlobStorage {
    container: Arc<dyn BlobContainer>,
}

impl RemoteBlobStorage {
    /// Wrap a container.
    pub fn new(container: Arc<dyn BlobContainer>) -> Self {
        Self { container }
    }
}

#[async_trait::async_trait]
impl MediaStorage for RemoteBlobStorage {
    #[tracing::instrument(skip(self, cancel))]
    async fn get(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<Option<StorageEntry>> {
        ensure_active(cancel, "get")?;

        let Some(name) = decode_name(name) else {
            tracing::debug!("Name does not map to a blob");
            return Ok(None);
        };

        if !self.container.exists(&name).await? {
            tracing::debug!("Blob not found");
            return Ok(None);
        }

        ensure_active(cancel, "get")?;

        // The blob may disappear between the two calls.
        let Some(properties) = self.container.properties(&name).await? else {
            tracing::debug!("Blob vanished before its properties were read");
            return Ok(None);
        };

        let content = Arc::new(BlobContent {
            container: Arc::clone(&self.container),
            name: name.clone(),
        });
        Ok(Some(StorageEntry::new(
            name,
            properties.content_type.clone(),
            properties.content_length,
            properties.last_modified,
            content,
        )))
    }

    #[tracing::instrument(skip(self, entry, cancel), fields(name = %entry.name(), size = entry.content_length()))]
    async fn put(&self, entry: &StorageEntry, cancel: &CancellationToken) -> StorageResult<()> {
        ensure_active(cancel, "put")?;

        let name = decode_name(entry.name()).ok_or_else(|| {
            StorageError::new(StorageErrorKind::InvalidPath(entry.name().to_string()))
        })?;

        // TODO: enforce the service's single-request upload ceiling once block
        // uploads are supported; larger entries currently fail remotely.
        let content = entry.open().await?;
        self.container
            .upload(
                &name,
                entry.content_type(),
                *entry.content_length(),
                content,
            )
            .await?;

        tracing::info!("Uploaded blob");
        Ok(())
    }

    #[tracing::instrument(skip(self, cancel))]
    async fn delete(&self, name: &str, cancel: &CancellationToken) -> StorageResult<bool> {
        ensure_active(cancel, "delete")?;
        match decode_name(name) {
            Some(name) => self.container.delete_if_exists(&name).await,
            None => Ok(false),
        }
    }
}

/// Content downloaded from the container on demand.
struct BlobContent {
    container: Arc<dyn BlobContainer>,
    name: String,
}

#[async_trait::async_trait]
impl EntryContent for BlobContent {
    async fn open(&self) -> StorageResult<ContentStream> {
        self.container.download(&self.name).await
    }
}

#[derive(Debug, Clone)]
struct StoredBlob {
    properties: BlobProperties,
    data: Bytes,
}

/// Blob container held in process memory.
///
/// Useful for tests and local development; contents are lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryBlobContainer {
    blobs: DashMap<String, StoredBlob>,
}

impl InMemoryBlobContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a blob directly, bypassing the upload path.
    pub fn insert(
        &self,
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) {
        let data = data.into();
        let properties = BlobProperties::new(content_type, data.len() as u64, Utc::now());
        self.blobs.insert(name.into(), StoredBlob { properties, data });
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether the container holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait::async_trait]
impl BlobContainer for InMemoryBlobContainer {
    async fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.blobs.contains_key(name))
    }

    async fn properties(&self, name: &str) -> StorageResult<Option<BlobProperties>> {
        Ok(self.blobs.get(name).map(|blob| blob.properties.clone()))
    }

    async fn download(&self, name: &str) -> StorageResult<ContentStream> {
        let data = self
            .blobs
            .get(name)
            .map(|blob| blob.data.clone())
            .ok_or_else(|| {
                StorageError::new(StorageErrorKind::RemoteRead(format!(
                    "blob not found: {}",
                    name
                )))
            })?;
        Ok(futures::stream::once(async move { Ok(data) }).boxed())
    }

    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        _content_length: u64,
        mut content: ContentStream,
    ) -> StorageResult<()> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = content.next().await {
            let chunk = chunk.map_err(|e| {
                StorageError::new(StorageErrorKind::RemoteWrite(format!("{}: {}", name, e)))
            })?;
            buffer.extend_from_slice(&chunk);
        }

        self.insert(name, content_type, buffer.freeze());
        Ok(())
    }

    async fn delete_if_exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.blobs.remove(name).is_some())
    }
}
