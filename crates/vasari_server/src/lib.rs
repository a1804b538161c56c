//! Media file resolution for Vasari.
//!
//! An axum middleware that answers requests for stored media files by
//! identifier, with shared backend fetches, conditional request handling and
//! browser caching headers. Requests it does not answer fall through to the
//! rest of the application.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vasari_server::{MediaFileResolver, VasariConfig, build_storage, router};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = VasariConfig::load(None)?;
//! let storage = build_storage(&config)?;
//! let resolver = MediaFileResolver::builder()
//!     .storage(storage)
//!     .options(config.resolver().clone())
//!     .build()?;
//!
//! let app = router(Arc::new(resolver));
//! let listener = tokio::net::TcpListener::bind(config.server().bind_address()).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod observability;
mod options;
mod precondition;
mod resolver;
mod server;

pub use config::{
    ServerSettings, ServerSettingsBuilder, StorageSettings, VasariConfig, build_storage,
};
pub use observability::{LoggingConfig, LoggingConfigBuilder, init_tracing};
pub use options::{
    DEFAULT_BROWSER_MAX_AGE, RequestTarget, ResolverOptions, ResolverOptionsBuilder,
};
pub use precondition::{
    ConditionalHeaders, EntityTag, PreconditionState, format_http_date, parse_http_date,
};
pub use resolver::{
    FetchOutcome, MatchValidator, MediaFileResolver, MediaFileResolverBuilder, resolve_media,
};
pub use server::{bind, router, serve};

pub use vasari_error::{ServerError, ServerErrorKind};
