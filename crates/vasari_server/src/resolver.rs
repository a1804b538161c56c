//! Media file resolution middleware.
//!
//! Requests whose target parses as a closed `media-file` identifier are
//! answered from storage. Concurrent requests for the same asset share one
//! backend fetch; each request then gets its own response, evaluated against
//! its own conditional headers. Anything else, including misses and backend
//! failures, falls through to the next handler.

use crate::precondition::{ConditionalHeaders, EntityTag, PreconditionState, format_http_date};
use crate::{RequestTarget, ResolverOptions};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{
    CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, HOST, LAST_MODIFIED,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vasari_cache::InFlightRegistry;
use vasari_core::{MEDIA_FILE, Udi, UdiType};
use vasari_error::{BuilderError, BuilderErrorKind, StorageError};
use vasari_storage::{DEFAULT_CONTENT_TYPE, MediaStorage, StorageEntry};

/// Hook that can veto serving a matched identifier.
#[async_trait::async_trait]
pub trait MatchValidator: Send + Sync {
    /// Return `false` to let the request fall through.
    async fn validate(&self, udi: &Udi, headers: &HeaderMap) -> bool;
}

/// Result of the shared backend fetch for one key.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The asset exists
    Found(StorageEntry),
    /// No asset under this name
    Missing,
    /// The backend failed
    Failed(StorageError),
}

/// Resolves media file requests against a storage backend.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use axum::{Router, middleware};
/// use vasari_server::{MediaFileResolver, resolve_media};
/// use vasari_storage::{InMemoryBlobContainer, RemoteBlobStorage};
///
/// let storage = Arc::new(RemoteBlobStorage::new(Arc::new(InMemoryBlobContainer::new())));
/// let resolver = Arc::new(MediaFileResolver::builder().storage(storage).build().unwrap());
///
/// let app: Router = Router::new()
///     .layer(middleware::from_fn_with_state(resolver, resolve_media));
/// ```
#[derive(derive_builder::Builder)]
#[builder(pattern = "owned", build_fn(private, name = "build_internal"))]
pub struct MediaFileResolver {
    /// Storage backend assets are read from
    storage: Arc<dyn MediaStorage>,

    /// Response and matching options
    #[builder(default)]
    options: ResolverOptions,

    /// Optional veto hook
    #[builder(default, setter(strip_option))]
    validator: Option<Arc<dyn MatchValidator>>,

    /// Cancels backend fetches on shutdown
    #[builder(default)]
    shutdown: CancellationToken,

    #[builder(setter(skip))]
    in_flight: InFlightRegistry<FetchOutcome>,
}

impl MediaFileResolverBuilder {
    /// Build the resolver.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` if no storage backend was given.
    pub fn build(self) -> Result<MediaFileResolver, BuilderError> {
        self.build_internal()
            .map_err(|e| BuilderError::new(BuilderErrorKind::MissingField(e.to_string())))
    }
}

impl std::fmt::Debug for MediaFileResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFileResolver")
            .field("options", &self.options)
            .field("has_validator", &self.validator.is_some())
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl MediaFileResolver {
    /// Start building a resolver.
    pub fn builder() -> MediaFileResolverBuilder {
        MediaFileResolverBuilder::default()
    }

    /// Resolver with default options.
    pub fn new(storage: Arc<dyn MediaStorage>) -> Self {
        Self {
            storage,
            options: ResolverOptions::default(),
            validator: None,
            shutdown: CancellationToken::new(),
            in_flight: InFlightRegistry::new(),
        }
    }

    /// Active options.
    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Token cancelled on shutdown.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Stop issuing backend fetches.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Number of backend fetches in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.in_flight()
    }

    /// Identify the media file a request targets, if any.
    pub fn identify(&self, uri: &Uri, headers: &HeaderMap) -> Option<Udi> {
        let path = uri.path();
        let candidate = match self.options.request_target() {
            RequestTarget::Path => format!("{}:/{}", self.options.scheme(), path),
            RequestTarget::HostAndPath => {
                let host = headers
                    .get(HOST)
                    .and_then(|h| h.to_str().ok())
                    .or_else(|| uri.host())?;
                format!("{}://{}{}", self.options.scheme(), host, path)
            }
        };

        let udi = Udi::try_parse(&candidate)?;
        (udi.entity_type_name() == MEDIA_FILE && udi.kind() == UdiType::ClosedString)
            .then_some(udi)
    }

    /// Answer a request for `udi`, or `None` to let it fall through.
    #[tracing::instrument(skip_all, fields(%uri, %udi))]
    pub async fn respond(
        &self,
        method: &Method,
        uri: &Uri,
        udi: &Udi,
        headers: &HeaderMap,
    ) -> Option<Response> {
        if let Some(validator) = &self.validator {
            if !validator.validate(udi, headers).await {
                tracing::debug!("Match vetoed by validator");
                return None;
            }
        }

        let key = udi.id()?.into_owned();
        let entry = match self.fetch(&key).await {
            FetchOutcome::Found(entry) => entry,
            FetchOutcome::Missing => {
                tracing::debug!(key = %key, "Media file not found");
                return None;
            }
            FetchOutcome::Failed(e) => {
                tracing::error!(key = %key, error = %e, "Failed to resolve media file");
                return None;
            }
        };

        let etag = EntityTag::for_asset(entry.last_modified(), *entry.content_length());
        let state =
            ConditionalHeaders::from_headers(headers).evaluate(entry.last_modified(), &etag);

        match state {
            PreconditionState::Unspecified | PreconditionState::ShouldProcess => {
                let body = if *method == Method::HEAD {
                    Body::empty()
                } else {
                    match entry.open().await {
                        Ok(stream) => Body::from_stream(stream),
                        Err(e) => {
                            tracing::error!(key = %key, error = %e, "Failed to open media file");
                            return None;
                        }
                    }
                };

                tracing::info!(key = %key, "Serving media file");
                let mut response = self.response(StatusCode::OK, &entry, &etag, body);
                response
                    .headers_mut()
                    .insert(CONTENT_LENGTH, HeaderValue::from(*entry.content_length()));
                Some(response)
            }
            PreconditionState::NotModified => {
                tracing::info!(key = %key, "Media file not modified");
                Some(self.response(StatusCode::NOT_MODIFIED, &entry, &etag, Body::empty()))
            }
            PreconditionState::PreconditionFailed => {
                tracing::info!(key = %key, "Media file precondition failed");
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::PRECONDITION_FAILED;
                Some(response)
            }
        }
    }

    /// Join or start the shared backend fetch for `key`.
    async fn fetch(&self, key: &str) -> FetchOutcome {
        let storage = Arc::clone(&self.storage);
        let cancel = self.shutdown.child_token();
        let name = key.to_string();

        let outcome = self
            .in_flight
            .run(key, move || async move {
                match storage.get(&name, &cancel).await {
                    Ok(Some(entry)) => FetchOutcome::Found(entry),
                    Ok(None) => FetchOutcome::Missing,
                    Err(e) => FetchOutcome::Failed(e),
                }
            })
            .await;

        match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(key, error = %e, "Media file fetch did not complete");
                FetchOutcome::Missing
            }
        }
    }

    fn response(
        &self,
        status: StatusCode,
        entry: &StorageEntry,
        etag: &EntityTag,
        body: Body,
    ) -> Response {
        let mut response = Response::new(body);
        *response.status_mut() = status;

        let headers = response.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(entry.content_type())
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
        );
        if let Ok(value) = HeaderValue::from_str(&self.options.cache_control()) {
            headers.insert(CACHE_CONTROL, value);
        }
        if let Ok(value) = HeaderValue::from_str(&format_http_date(entry.last_modified())) {
            headers.insert(LAST_MODIFIED, value);
        }
        if let Ok(value) = HeaderValue::from_str(&etag.to_string()) {
            headers.insert(ETAG, value);
        }

        response
    }
}

/// Axum middleware answering media file requests from the resolver.
///
/// Install with [`axum::middleware::from_fn_with_state`].
pub async fn resolve_media(
    State(resolver): State<Arc<MediaFileResolver>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    if method != Method::GET && method != Method::HEAD {
        return next.run(request).await;
    }

    let Some(udi) = resolver.identify(request.uri(), request.headers()) else {
        return next.run(request).await;
    };

    let uri = request.uri().clone();
    let headers = request.headers().clone();
    match resolver.respond(&method, &uri, &udi, &headers).await {
        Some(response) => response,
        None => next.run(request).await,
    }
}
