//! File name to MIME type mapping.

use std::collections::HashMap;
use std::path::Path;
use vasari_error::{StorageError, StorageErrorKind, StorageResult};

/// Content type reported when a file extension is unknown.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const BUNDLED_MIME_TYPES: &str = include_str!("../data/mime.types");

/// Maps file names to content types and back.
pub trait ContentTypeProvider: Send + Sync {
    /// Content type for a file name, [`DEFAULT_CONTENT_TYPE`] when unknown.
    fn content_type(&self, file_name: &str) -> String;

    /// Preferred extension (without the dot) for a content type.
    fn file_extension(&self, content_type: &str) -> Option<String>;
}

/// Provider backed by an Apache `mime.types` table.
///
/// # Examples
///
/// ```
/// use vasari_storage::{ApacheContentTypeProvider, ContentTypeProvider};
///
/// let provider = ApacheContentTypeProvider::bundled();
/// assert_eq!(provider.content_type("2024/abc.JPG"), "image/jpeg");
/// assert_eq!(provider.file_extension("image/jpeg").as_deref(), Some("jpg"));
/// assert_eq!(provider.content_type("README"), "application/octet-stream");
/// ```
#[derive(Debug, Clone)]
pub struct ApacheContentTypeProvider {
    by_extension: HashMap<String, String>,
    by_content_type: HashMap<String, String>,
}

impl ApacheContentTypeProvider {
    /// Provider over the table shipped with this crate.
    pub fn bundled() -> Self {
        Self::parse(BUNDLED_MIME_TYPES)
    }

    /// Parse a table in `mime.types` format.
    ///
    /// Later lines win for a repeated extension; the first extension listed
    /// for a type is its preferred one.
    pub fn parse(table: &str) -> Self {
        let mut by_extension = HashMap::new();
        let mut by_content_type = HashMap::new();

        for line in table.lines() {
            let line = match line.split_once('#') {
                Some((content, _)) => content,
                None => line,
            };

            let mut fields = line.split_whitespace();
            let Some(content_type) = fields.next() else {
                continue;
            };
            let content_type = content_type.to_ascii_lowercase();

            for extension in fields {
                let extension = extension.to_ascii_lowercase();
                by_content_type
                    .entry(content_type.clone())
                    .or_insert_with(|| extension.clone());
                by_extension.insert(extension, content_type.clone());
            }
        }

        tracing::debug!(
            extensions = by_extension.len(),
            content_types = by_content_type.len(),
            "Parsed mime.types table"
        );

        Self {
            by_extension,
            by_content_type,
        }
    }

    /// Load a `mime.types` table from disk.
    ///
    /// # Errors
    ///
    /// Returns `FileRead` if the file cannot be read.
    #[tracing::instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let table = std::fs::read_to_string(path).map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        Ok(Self::parse(&table))
    }
}

impl Default for ApacheContentTypeProvider {
    fn default() -> Self {
        Self::bundled()
    }
}

impl ContentTypeProvider for ApacheContentTypeProvider {
    fn content_type(&self, file_name: &str) -> String {
        let file_name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
        file_name
            .rsplit_once('.')
            .and_then(|(_, extension)| self.by_extension.get(&extension.to_ascii_lowercase()))
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
    }

    fn file_extension(&self, content_type: &str) -> Option<String> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim()
            .to_ascii_lowercase();
        self.by_content_type.get(&essence).cloned()
    }
}
