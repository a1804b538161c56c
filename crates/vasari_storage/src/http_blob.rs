//! Blob container over the Azure Blob Storage REST API.

use crate::{BlobContainer, BlobProperties, ContentStream, DEFAULT_CONTENT_TYPE};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, LAST_MODIFIED};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use url::Url;
use vasari_error::{StorageError, StorageErrorKind, StorageResult};

/// REST API version sent with every request.
pub const BLOB_API_VERSION: &str = "2021-08-06";

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Configuration for a remote blob container.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_builder::Builder,
)]
#[builder(setter(into))]
pub struct BlobStorageConfig {
    /// Storage account connection string
    connection_string: String,
    /// Container holding the media blobs
    container_name: String,
}

/// Endpoint and credentials extracted from a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConnectionString {
    endpoint: Url,
    sas: Option<String>,
}

impl ConnectionString {
    /// Parse `Key=Value;Key=Value` pairs.
    ///
    /// Supports an explicit `BlobEndpoint`, or `AccountName` with optional
    /// `DefaultEndpointsProtocol` and `EndpointSuffix`. Authorization is by
    /// shared access signature or anonymous.
    #[track_caller]
    fn parse(value: &str) -> StorageResult<Self> {
        let settings: HashMap<String, &str> = value
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim()))
            .collect();

        let sas = settings
            .get("sharedaccesssignature")
            .map(|sas| sas.trim_start_matches('?').to_string());

        if sas.is_none() && settings.contains_key("accountkey") {
            return Err(invalid_config(
                "shared key authorization is not supported; use SharedAccessSignature",
            ));
        }

        let endpoint = match settings.get("blobendpoint") {
            Some(endpoint) => endpoint.to_string(),
            None => {
                let account = settings
                    .get("accountname")
                    .ok_or_else(|| invalid_config("missing BlobEndpoint or AccountName"))?;
                let protocol = settings
                    .get("defaultendpointsprotocol")
                    .copied()
                    .unwrap_or("https");
                let suffix = settings
                    .get("endpointsuffix")
                    .copied()
                    .unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
                format!("{}://{}.blob.{}", protocol, account, suffix)
            }
        };

        let endpoint = Url::parse(&endpoint)
            .map_err(|e| invalid_config(&format!("blob endpoint {}: {}", endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(invalid_config("blob endpoint must be a base URL"));
        }

        Ok(Self { endpoint, sas })
    }
}

#[track_caller]
fn invalid_config(message: &str) -> StorageError {
    StorageError::new(StorageErrorKind::InvalidConfig(message.to_string()))
}

/// Blob container reached over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpBlobContainer {
    client: reqwest::Client,
    container_url: Url,
    sas: Option<String>,
}

impl HttpBlobContainer {
    /// Create a container client with a default HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the connection string is unusable.
    pub fn new(config: &BlobStorageConfig) -> StorageResult<Self> {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a container client sharing an existing HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the connection string is unusable.
    #[tracing::instrument(skip(client, config), fields(container = %config.container_name()))]
    pub fn with_client(client: reqwest::Client, config: &BlobStorageConfig) -> StorageResult<Self> {
        if config.container_name().trim().is_empty() {
            return Err(invalid_config("container name must not be empty"));
        }

        let ConnectionString { endpoint, sas } = ConnectionString::parse(config.connection_string())?;

        let mut container_url = endpoint;
        container_url
            .path_segments_mut()
            .map_err(|_| invalid_config("blob endpoint must be a base URL"))?
            .pop_if_empty()
            .push(config.container_name());

        tracing::info!(url = %container_url, "Configured blob container");
        Ok(Self {
            client,
            container_url,
            sas,
        })
    }

    /// URL of the container, without credentials.
    pub fn container_url(&self) -> &Url {
        &self.container_url
    }

    fn blob_url(&self, name: &str) -> StorageResult<Url> {
        let mut url = self.container_url.clone();
        url.path_segments_mut()
            .map_err(|_| invalid_config("blob endpoint must be a base URL"))?
            .extend(name.split('/'));
        url.set_query(self.sas.as_deref());
        Ok(url)
    }

    fn request(&self, method: Method, name: &str) -> StorageResult<RequestBuilder> {
        let url = self.blob_url(name)?;
        Ok(self
            .client
            .request(method, url)
            .header("x-ms-version", BLOB_API_VERSION))
    }

    async fn head(&self, name: &str) -> StorageResult<Option<HeaderMap>> {
        let response = self
            .request(Method::HEAD, name)?
            .send()
            .await
            .map_err(|e| read_error(name, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.headers().clone())),
            status => Err(StorageError::new(StorageErrorKind::RemoteRead(format!(
                "HEAD {}: {}",
                name, status
            )))),
        }
    }
}

#[track_caller]
fn read_error(name: &str, e: reqwest::Error) -> StorageError {
    StorageError::new(StorageErrorKind::RemoteRead(format!("{}: {}", name, e)))
}

#[track_caller]
fn write_error(name: &str, e: reqwest::Error) -> StorageError {
    StorageError::new(StorageErrorKind::RemoteWrite(format!("{}: {}", name, e)))
}

fn parse_properties(name: &str, headers: &HeaderMap) -> StorageResult<BlobProperties> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    let content_length = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let last_modified = headers
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .map(|v| v.with_timezone(&Utc))
        .ok_or_else(|| {
            StorageError::new(StorageErrorKind::RemoteRead(format!(
                "{}: missing or invalid Last-Modified",
                name
            )))
        })?;

    Ok(BlobProperties::new(
        content_type,
        content_length,
        last_modified,
    ))
}

#[async_trait::async_trait]
impl BlobContainer for HttpBlobContainer {
    #[tracing::instrument(skip(self))]
    async fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.head(name).await?.is_some())
    }

    #[tracing::instrument(skip(self))]
    async fn properties(&self, name: &str) -> StorageResult<Option<BlobProperties>> {
        match self.head(name).await? {
            Some(headers) => parse_properties(name, &headers).map(Some),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn download(&self, name: &str) -> StorageResult<ContentStream> {
        let response = self
            .request(Method::GET, name)?
            .send()
            .await
            .map_err(|e| read_error(name, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::new(StorageErrorKind::RemoteRead(format!(
                "GET {}: {}",
                name, status
            ))));
        }

        Ok(response.bytes_stream().map_err(io::Error::other).boxed())
    }

    #[tracing::instrument(skip(self, content))]
    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        content_length: u64,
        content: ContentStream,
    ) -> StorageResult<()> {
        let response = self
            .request(Method::PUT, name)?
            .header("x-ms-blob-type", "BlockBlob")
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, content_length)
            .body(reqwest::Body::wrap_stream(content))
            .send()
            .await
            .map_err(|e| write_error(name, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::new(StorageErrorKind::RemoteWrite(format!(
                "PUT {}: {} {}",
                name, status, body
            ))));
        }

        tracing::debug!(%status, "Uploaded blob");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_if_exists(&self, name: &str) -> StorageResult<bool> {
        let response = self
            .request(Method::DELETE, name)?
            .send()
            .await
            .map_err(|e| write_error(name, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(StorageError::new(StorageErrorKind::RemoteWrite(format!(
                "DELETE {}: {}",
                name, status
            )))),
        }
    }
}
