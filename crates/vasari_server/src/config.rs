//! Server configuration.

use crate::{LoggingConfig, ResolverOptions};
use config::{Config, Environment, File, FileFormat};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument};
use vasari_error::{ConfigError, VasariError, VasariResult};
use vasari_storage::{
    ApacheContentTypeProvider, BlobStorageConfig, ContentTypeProvider, FileSystemStorageConfig,
    HttpBlobContainer, MediaStorage, RemoteBlobStorage, ShardedFileStorage,
};

/// Default configuration bundled with the server.
const DEFAULT_CONFIG: &str = include_str!("../vasari.toml");

/// Listener and filesystem settings.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(setter(into))]
pub struct ServerSettings {
    /// Socket address to listen on
    #[builder(default = "default_bind_address()")]
    #[serde(default = "default_bind_address")]
    bind_address: String,

    /// Base directory relative storage paths resolve against
    #[builder(default = "default_content_root()")]
    #[serde(default = "default_content_root")]
    content_root: PathBuf,

    /// Apache-format MIME table replacing the bundled one
    #[builder(default)]
    #[serde(default)]
    mime_types: Option<PathBuf>,
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_content_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            content_root: default_content_root(),
            mime_types: None,
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageSettings {
    /// Sharded local directory tree
    Filesystem(FileSystemStorageConfig),
    /// Remote blob container
    Blob(BlobStorageConfig),
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self::Filesystem(FileSystemStorageConfig::default())
    }
}

/// Complete server configuration.
///
/// Sources in order of precedence (later sources override earlier):
/// 1. Bundled defaults (`vasari.toml` shipped with the server)
/// 2. User config in home directory (`~/.config/vasari/vasari.toml`)
/// 3. User config in current directory (`./vasari.toml`)
/// 4. An explicit file passed on the command line
/// 5. Environment variables such as `VASARI__SERVER__BIND_ADDRESS`
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters, derive_setters::Setters,
)]
#[setters(prefix = "with_")]
pub struct VasariConfig {
    /// Listener settings
    #[serde(default)]
    server: ServerSettings,

    /// Resolver options
    #[serde(default)]
    resolver: ResolverOptions,

    /// Storage backend
    #[serde(default)]
    storage: StorageSettings,

    /// Log output
    #[serde(default)]
    logging: LoggingConfig,
}

impl VasariConfig {
    /// Load configuration from a single TOML file, without other sources.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> VasariResult<Self> {
        Config::builder()
            .add_source(File::from(path.as_ref()).format(FileFormat::Toml))
            .build()
            .map_err(|e| {
                VasariError::from(ConfigError::source_failed(path.as_ref().display(), e))
            })?
            .try_deserialize()
            .map_err(|e| {
                VasariError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Load configuration from every source.
    ///
    /// User config files are optional and silently skipped if not found; an
    /// explicit file must exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use vasari_server::VasariConfig;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = VasariConfig::load(None)?;
    /// println!("listening on {}", config.server().bind_address());
    /// # Ok(())
    /// # }
    /// ```
    #[instrument]
    pub fn load(explicit: Option<&Path>) -> VasariResult<Self> {
        debug!("Loading configuration with precedence: env > explicit > current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/vasari/vasari.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("vasari").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("VASARI")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .map_err(|e| {
                VasariError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                VasariError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        debug!(
            bind_address = %config.server.bind_address,
            request_target = %config.resolver.request_target(),
            "Configuration loaded"
        );
        Ok(config)
    }
}

/// Build the configured storage backend.
///
/// # Errors
///
/// Returns an error if the MIME table cannot be read, the storage root cannot
/// be created, or the blob connection string is invalid.
#[instrument(skip(config))]
pub fn build_storage(config: &VasariConfig) -> VasariResult<Arc<dyn MediaStorage>> {
    match config.storage() {
        StorageSettings::Filesystem(fs) => {
            let content_types: Arc<dyn ContentTypeProvider> = match config.server().mime_types() {
                Some(path) => Arc::new(ApacheContentTypeProvider::from_file(path)?),
                None => Arc::new(ApacheContentTypeProvider::bundled()),
            };
            let storage =
                ShardedFileStorage::from_config(fs, config.server().content_root(), content_types)?;
            debug!(root = %storage.root().display(), "Using filesystem storage");
            Ok(Arc::new(storage))
        }
        StorageSettings::Blob(blob) => {
            let container = HttpBlobContainer::new(blob)?;
            debug!(container = %container.container_url(), "Using blob storage");
            Ok(Arc::new(RemoteBlobStorage::new(Arc::new(container))))
        }
    }
}
