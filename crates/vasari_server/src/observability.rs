//! Structured logging setup.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    EnvFilter,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};
use vasari_error::{ServerError, ServerErrorKind};

/// Log output configuration.
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
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info", "vasari_server=debug")
    #[builder(default = "default_level()")]
    #[serde(default = "default_level")]
    level: String,

    /// Emit JSON lines instead of human-readable output
    #[builder(default)]
    #[serde(default)]
    json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Errors
///
/// Returns `Tracing` if the filter is invalid or a subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ServerError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ServerError::new(ServerErrorKind::Tracing(e.to_string())))?;

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ServerError::new(ServerErrorKind::Tracing(e.to_string())))
}
