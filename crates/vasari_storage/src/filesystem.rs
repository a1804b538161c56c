//! Sharded filesystem storage backend.

use crate::storage::ensure_active;
use crate::{
    ContentStream, ContentTypeProvider, EntryContent, MediaStorage, StorageEntry, shard_path,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use vasari_error::{StorageError, StorageErrorKind, StorageResult};

/// Configuration for [`ShardedFileStorage`].
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_builder::Builder,
)]
#[builder(setter(into))]
pub struct FileSystemStorageConfig {
    /// Storage root; relative paths resolve against the content root
    #[builder(default = "default_root_path()")]
    #[serde(default = "default_root_path")]
    root_path: PathBuf,
}

fn default_root_path() -> PathBuf {
    PathBuf::from("media")
}

impl Default for FileSystemStorageConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
        }
    }
}

/// Filesystem storage backend with a sharded directory layout.
///
/// Each asset lives at `{root}/{shard_path(name)}`:
///
/// ```text
/// /srv/vasari/media/
/// ├── a/
/// │   └── b/
/// │       └── c/
/// │           └── abc.jpg
/// └── l/
///     └── o/
///         └── g/
///             └── o/
///                 └── logo.png
/// ```
///
/// Writes go to a temporary sibling file that is renamed over the destination,
/// so readers never observe a partially written asset.
pub struct ShardedFileStorage {
    root: PathBuf,
    content_types: Arc<dyn ContentTypeProvider>,
}

impl ShardedFileStorage {
    /// Create a backend rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryCreation` if the root cannot be created.
    #[tracing::instrument(skip(root, content_types))]
    pub fn new(
        root: impl Into<PathBuf>,
        content_types: Arc<dyn ContentTypeProvider>,
    ) -> StorageResult<Self> {
        let root = root.into();

        std::fs::create_dir_all(&root).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                root.display(),
                e
            )))
        })?;

        tracing::info!(path = %root.display(), "Created sharded filesystem storage");
        Ok(Self {
            root,
            content_types,
        })
    }

    /// Create a backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryCreation` if the root cannot be created.
    pub fn from_config(
        config: &FileSystemStorageConfig,
        content_root: &Path,
        content_types: Arc<dyn ContentTypeProvider>,
    ) -> StorageResult<Self> {
        Self::new(
            resolve_root(config.root_path(), content_root),
            content_types,
        )
    }

    /// Storage root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of the named asset, or `None` for unusable names.
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        shard_path(name).map(|relative| self.root.join(relative))
    }
}

/// Absolute roots are used as-is; relative ones are joined to the content root.
pub fn resolve_root(root: &Path, content_root: &Path) -> PathBuf {
    if root.is_absolute() {
        root.to_path_buf()
    } else {
        content_root.join(root)
    }
}

#[async_trait::async_trait]
impl MediaStorage for ShardedFileStorage {
    #[tracing::instrument(skip(self, cancel), fields(root = %self.root.display()))]
    async fn get(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<Option<StorageEntry>> {
        ensure_active(cancel, "get")?;

        let Some(path) = self.path_for(name) else {
            tracing::debug!("Name does not map to a file");
            return Ok(None);
        };

        // The open handle pins this version of the file; a later rename over
        // the path does not change what the entry streams.
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if is_missing(&e) => {
                tracing::debug!(path = %path.display(), "Media file not found");
                return Ok(None);
            }
            Err(e) => {
                return Err(StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                ))));
            }
        };

        let metadata = file.metadata().await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "metadata of {}: {}",
                path.display(),
                e
            )))
        })?;

        if !metadata.is_file() {
            return Ok(None);
        }

        let last_modified = metadata.modified().map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "modification time of {}: {}",
                path.display(),
                e
            )))
        })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = self.content_types.content_type(&file_name);

        tracing::debug!(
            path = %path.display(),
            size = metadata.len(),
            content_type = %content_type,
            "Found media file"
        );

        Ok(Some(StorageEntry::new(
            file_name,
            content_type,
            metadata.len(),
            DateTime::<Utc>::from(last_modified),
            Arc::new(FileContent {
                file: Arc::new(file.into_std().await),
                length: metadata.len(),
            }),
        )))
    }

    #[tracing::instrument(skip(self, entry, cancel), fields(name = %entry.name(), size = entry.content_length()))]
    async fn put(&self, entry: &StorageEntry, cancel: &CancellationToken) -> StorageResult<()> {
        ensure_active(cancel, "put")?;

        let path = self.path_for(entry.name()).ok_or_else(|| {
            StorageError::new(StorageErrorKind::InvalidPath(entry.name().to_string()))
        })?;
        let parent = path.parent().unwrap_or(&self.root);

        // Tolerates a concurrent writer creating the same directories.
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                parent.display(),
                e
            )))
        })?;

        let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4().simple()));
        if let Err(e) = write_temp(&temp_path, entry, cancel).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }

        tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
        })?;

        tracing::info!(
            path = %path.display(),
            size = entry.content_length(),
            "Stored media file"
        );
        Ok(())
    }

    #[tracing::instrument(skip(self, cancel), fields(root = %self.root.display()))]
    async fn delete(&self, name: &str, cancel: &CancellationToken) -> StorageResult<bool> {
        ensure_active(cancel, "delete")?;

        let Some(path) = self.path_for(name) else {
            return Ok(false);
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Deleted media file");
                Ok(true)
            }
            Err(e) if is_missing(&e) => Ok(false),
            Err(e) => Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "delete {}: {}",
                path.display(),
                e
            )))),
        }
    }
}

async fn write_temp(
    temp_path: &Path,
    entry: &StorageEntry,
    cancel: &CancellationToken,
) -> StorageResult<()> {
    let write_error = |e: io::Error| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "{}: {}",
            temp_path.display(),
            e
        )))
    };

    let mut content = entry.open().await?;
    let mut file = tokio::fs::File::create(temp_path)
        .await
        .map_err(write_error)?;

    while let Some(chunk) = content.next().await {
        ensure_active(cancel, "put")?;
        let chunk = chunk.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "content of {}: {}",
                entry.name(),
                e
            )))
        })?;
        file.write_all(&chunk).await.map_err(write_error)?;
    }

    file.flush().await.map_err(write_error)?;

    let file = file.into_std().await;
    let modified = SystemTime::from(*entry.last_modified());
    tokio::task::spawn_blocking(move || {
        file.set_modified(modified)?;
        file.sync_all()
    })
    .await
    .map_err(io::Error::other)
    .and_then(|result| result)
    .map_err(write_error)?;
    Ok(())
}

/// A missing file, or a shard directory occupied by a file.
fn is_missing(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

const READ_CHUNK: u64 = 64 * 1024;

/// Content streamed from an open file handle.
///
/// Reads are positional, so concurrent streams over one handle do not share a
/// cursor, and never go past the length captured with the entry.
struct FileContent {
    file: Arc<std::fs::File>,
    length: u64,
}

#[async_trait::async_trait]
impl EntryContent for FileContent {
    async fn open(&self) -> StorageResult<ContentStream> {
        let file = Arc::clone(&self.file);
        let length = self.length;
        let stream = futures::stream::try_unfold(0u64, move |offset| {
            next_chunk(Arc::clone(&file), offset, length)
        });
        Ok(stream.boxed())
    }
}

async fn next_chunk(
    file: Arc<std::fs::File>,
    offset: u64,
    length: u64,
) -> io::Result<Option<(Bytes, u64)>> {
    if offset >= length {
        return Ok(None);
    }

    let len = (length - offset).min(READ_CHUNK) as usize;
    let chunk = tokio::task::spawn_blocking(move || read_at(&file, offset, len))
        .await
        .map_err(io::Error::other)??;
    if chunk.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "media file shorter than its recorded length",
        ));
    }

    let next = offset + chunk.len() as u64;
    Ok(Some((chunk, next)))
}

#[cfg(unix)]
fn read_at(file: &std::fs::File, offset: u64, len: usize) -> io::Result<Bytes> {
    use std::os::unix::fs::FileExt;

    let mut buf = vec![0; len];
    let read = file.read_at(&mut buf, offset)?;
    buf.truncate(read);
    Ok(Bytes::from(buf))
}

#[cfg(windows)]
fn read_at(file: &std::fs::File, offset: u64, len: usize) -> io::Result<Bytes> {
    use std::os::windows::fs::FileExt;

    let mut buf = vec![0; len];
    let read = file.seek_read(&mut buf, offset)?;
    buf.truncate(read);
    Ok(Bytes::from(buf))
}
