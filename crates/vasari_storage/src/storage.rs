//! Storage trait definition.

use crate::StorageEntry;
use tokio_util::sync::CancellationToken;
use vasari_error::{StorageError, StorageResult};

/// Trait for pluggable media storage backends.
///
/// Entries are addressed by name. A missing entry is `None` (or `false` for
/// [`MediaStorage::delete`]), never an error. Every operation checks the
/// cancellation token before doing any I/O and fails with
/// `StorageErrorKind::Canceled` if it has fired.
#[async_trait::async_trait]
pub trait MediaStorage: Send + Sync {
    /// Fetch a snapshot of the named entry.
    ///
    /// # Arguments
    ///
    /// * `name` - Asset name, possibly percent-encoded
    /// * `cancel` - Aborts the operation before I/O starts
    ///
    /// # Returns
    ///
    /// `Some(entry)` if the asset exists, `None` otherwise
    async fn get(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<Option<StorageEntry>>;

    /// Store an entry under its name, replacing any existing asset.
    async fn put(&self, entry: &StorageEntry, cancel: &CancellationToken) -> StorageResult<()>;

    /// Remove the named entry.
    ///
    /// # Returns
    ///
    /// `true` if an asset existed and was removed
    async fn delete(&self, name: &str, cancel: &CancellationToken) -> StorageResult<bool>;
}

/// Fail fast when the caller has already given up.
#[track_caller]
pub(crate) fn ensure_active(cancel: &CancellationToken, operation: &str) -> StorageResult<()> {
    if cancel.is_cancelled() {
        return Err(StorageError::canceled(operation));
    }
    Ok(())
}
