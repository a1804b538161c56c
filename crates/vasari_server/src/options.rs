//! Resolver options.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default browser cache lifetime: seven days.
pub const DEFAULT_BROWSER_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// How the identifier candidate is formed from an incoming request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestTarget {
    /// `{scheme}:/{path}`: the first path segment names the entity type,
    /// so `/media-file/abc.jpg` resolves to `umb://media-file/abc.jpg`
    #[default]
    Path,
    /// `{scheme}://{host}{path}`: the host names the entity type
    HostAndPath,
}

/// Options for [`crate::MediaFileResolver`].
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
pub struct ResolverOptions {
    /// `max-age` sent in `Cache-Control`, in seconds
    #[builder(default = "default_browser_max_age_secs()")]
    #[serde(default = "default_browser_max_age_secs")]
    browser_max_age_secs: u64,

    /// Scheme used when forming identifier candidates
    #[builder(default = "default_scheme()")]
    #[serde(default = "default_scheme")]
    scheme: String,

    /// Which parts of the request form the candidate
    #[builder(default)]
    #[serde(default)]
    request_target: RequestTarget,
}

fn default_browser_max_age_secs() -> u64 {
    DEFAULT_BROWSER_MAX_AGE.as_secs()
}

fn default_scheme() -> String {
    vasari_core::UDI_SCHEME.to_string()
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            browser_max_age_secs: default_browser_max_age_secs(),
            scheme: default_scheme(),
            request_target: RequestTarget::default(),
        }
    }
}

impl ResolverOptions {
    /// Browser cache lifetime.
    pub fn browser_max_age(&self) -> Duration {
        Duration::from_secs(self.browser_max_age_secs)
    }

    /// `Cache-Control` header value for served files.
    pub fn cache_control(&self) -> String {
        format!("public, max-age={}", self.browser_max_age_secs)
    }
}
