//! A Rust definition of the Blob service operations and a client to access them
use std::{ops::Range, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{header::HeaderMap, Body, Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::{
    auth::{get_token, TokenProvider},
    config::ClientConfig,
    error::{BlobServiceError, Result},
    listing::{ContinuationToken, Item, ListPages, ListRequest, Page},
};

static GLOBAL_CLIENT: Lazy<Client> = Lazy::new(Client::new);

/// Everything but unreserved characters and '/', which separates virtual
/// directories in a blob name
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

pub struct BlobServiceClient {
    /// A token provider to use to obtain a SAS token for each request
    token_provider: Option<Arc<dyn TokenProvider>>,
    /// The blob service URL, without a trailing slash
    endpoint: String,
    /// The API version sent as `x-ms-version`
    api_version: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StorageErrorBody {
    code: String,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    next_marker: Option<String>,
    #[serde(default)]
    blobs: BlobsXml,
}

#[derive(Debug, Default, Deserialize)]
struct BlobsXml {
    #[serde(rename = "Blob", default)]
    blobs: Vec<BlobXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BlobXml {
    name: String,
    snapshot: Option<String>,
    version_id: Option<String>,
    properties: Option<BlobPropertiesXml>,
}

#[derive(Debug, Deserialize)]
struct BlobPropertiesXml {
    #[serde(rename = "Last-Modified")]
    last_modified: Option<String>,
    #[serde(rename = "Content-Length")]
    content_length: Option<u64>,
    #[serde(rename = "Content-Type")]
    content_type: Option<String>,
}

impl From<BlobXml> for Item {
    fn from(blob: BlobXml) -> Self {
        let properties = blob.properties;
        Item {
            name: blob.name,
            snapshot: blob.snapshot.filter(|s| !s.is_empty()),
            version_id: blob.version_id.filter(|v| !v.is_empty()),
            content_length: properties.as_ref().and_then(|p| p.content_length),
            content_type: properties
                .as_ref()
                .and_then(|p| p.content_type.clone())
                .filter(|c| !c.is_empty()),
            last_modified: properties
                .as_ref()
                .and_then(|p| p.last_modified.as_deref())
                .and_then(parse_http_date),
        }
    }
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

fn parse_list_response(body: &str) -> Result<Page> {
    let results: EnumerationResults = quick_xml::de::from_str(body)
        .map_err(|err| BlobServiceError::InvalidResponse(err.to_string()))?;
    Ok(Page {
        items: results.blobs.blobs.into_iter().map(Item::from).collect(),
        next_token: ContinuationToken::from_marker(results.next_marker),
    })
}

/// A client for the Azure Blob service
///
/// Requests are authorized with a SAS token.  By default the token is read
/// from `AZURE_STORAGE_SAS_TOKEN` on every request; supply a token provider
/// with [`BlobServiceClient::new_external`] to obtain tokens some other way.
impl BlobServiceClient {
    /// Creates a client that reads its SAS token from the environment
    pub fn new(config: ClientConfig) -> Self {
        Self {
            token_provider: None,
            endpoint: config.endpoint,
            api_version: config.api_version,
        }
    }

    /// Creates a client that obtains SAS tokens from `token_provider`
    pub fn new_external(config: ClientConfig, token_provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            token_provider: Some(token_provider),
            endpoint: config.endpoint,
            api_version: config.api_version,
        }
    }

    /// Creates a client whose endpoint comes from the environment
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ClientConfig::from_env()?))
    }

    /// The URL of a container, or of a blob within it
    ///
    /// Names are percent-encoded, so a blob called `report#1.txt` maps to
    /// `.../report%231.txt`.
    pub fn url(&self, container: &str, blob: Option<&str>) -> String {
        let container_url = url_join(self.endpoint.clone(), encode_path(container));
        match blob {
            Some(blob) => url_join(container_url, encode_path(blob)),
            None => container_url,
        }
    }

    async fn request(
        &self,
        method: Method,
        operation: &str,
        container: &str,
        blob: Option<&str>,
    ) -> Result<RequestBuilder> {
        if container.is_empty() {
            return Err(BlobServiceError::required("container"));
        }
        if blob.map_or(false, str::is_empty) {
            return Err(BlobServiceError::required("blob"));
        }

        let pathname = match blob {
            Some(blob) => format!("{}/{}", container, blob),
            None => container.to_string(),
        };
        let token = get_token(self.token_provider.as_deref(), operation, Some(&pathname)).await?;

        let mut url = self.url(container, blob);
        if !token.is_empty() {
            url = format!("{}?{}", url, token);
        }

        debug!(%method, operation, pathname = %pathname, "blob service request");
        let request = GLOBAL_CLIENT.request(method, url);
        Ok(self.add_api_version_header(request))
    }

    fn add_api_version_header(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("x-ms-version", self.api_version.clone())
    }

    async fn handle_error(
        response: Response,
        container: &str,
        blob: Option<&str>,
    ) -> BlobServiceError {
        let status = response.status();
        let header_code = header_string(response.headers(), "x-ms-error-code");
        let body = response.text().await.unwrap_or_default();
        let detail = quick_xml::de::from_str::<StorageErrorBody>(&body).ok();

        let code = header_code.or_else(|| detail.as_ref().map(|d| d.code.clone()));
        let not_found = || match blob {
            Some(blob) => BlobServiceError::BlobNotFound(blob.to_string()),
            None => BlobServiceError::ContainerNotFound(container.to_string()),
        };

        match code.as_deref() {
            Some("ContainerNotFound") => BlobServiceError::ContainerNotFound(container.to_string()),
            Some("BlobNotFound") => not_found(),
            _ if status == StatusCode::NOT_FOUND => not_found(),
            Some(code) if status.as_u16() < 500 => BlobServiceError::ServiceError {
                status: status.as_u16(),
                code: code.to_string(),
                message: detail
                    .and_then(|d| d.message)
                    .map(|m| m.lines().next().unwrap_or("").to_string())
                    .unwrap_or_else(|| "unknown details".to_string()),
            },
            _ => BlobServiceError::unknown_error(status),
        }
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Operations of the Blob service used by the quickstart
///
/// Listing is reached through the [`ListPages`] supertrait so that it can be
/// driven by a [`PaginatedListing`].
///
/// [`PaginatedListing`]: crate::listing::PaginatedListing
#[async_trait]
pub trait BlobStorageApi: ListPages {
    /// Creates a container
    ///
    /// Fails with a 409 `ContainerAlreadyExists` service error when the
    /// container is already there, see [`BlobServiceError::is_already_exists`].
    async fn create_container(&self, container: &str) -> Result<()>;

    /// Deletes a container and every blob in it
    async fn delete_container(&self, container: &str) -> Result<()>;

    /// Uploads a block blob
    ///
    /// # Arguments
    ///
    /// * `container` - The container to upload into
    /// * `blob` - The name of the blob.  An existing blob is overwritten.
    /// * `body` - The contents of the blob
    /// * `options` - Options for the put operation
    async fn put(
        &self,
        container: &str,
        blob: &str,
        body: impl Into<Body> + Send,
        options: PutBlobOptions,
    ) -> Result<PutBlobResult>;

    /// Gets the properties of a blob
    ///
    /// Returns None if the blob does not exist
    async fn head(&self, container: &str, blob: &str) -> Result<Option<BlobProperties>>;

    /// Downloads a blob, or a byte range of it
    async fn download(
        &self,
        container: &str,
        blob: &str,
        options: DownloadOptions,
    ) -> Result<Bytes>;

    /// Deletes a blob
    async fn del(&self, container: &str, blob: &str, options: DeleteBlobOptions) -> Result<()>;
}

fn encode_path(name: &str) -> String {
    utf8_percent_encode(name, PATH_SEGMENT).to_string()
}

fn url_join(left: String, right: String) -> String {
    if left.ends_with('/') {
        if let Some(stripped) = right.strip_prefix('/') {
            left + stripped
        } else {
            left + &right
        }
    } else if right.starts_with('/') {
        left + &right
    } else {
        left + "/" + &right
    }
}

#[async_trait]
impl ListPages for BlobServiceClient {
    async fn list_page(&self, request: &ListRequest) -> Result<Page> {
        let container = request.collection.as_str();
        let mut http_request = self
            .request(Method::GET, "list", container, None)
            .await?
            .query(&[("restype", "container"), ("comp", "list")]);
        if let Some(prefix) = &request.prefix {
            http_request = http_request.query(&[("prefix", prefix)]);
        }
        let include: Vec<&str> = [
            (request.include_snapshots, "snapshots"),
            (request.include_versions, "versions"),
        ]
        .into_iter()
        .filter_map(|(wanted, dataset)| wanted.then_some(dataset))
        .collect();
        if !include.is_empty() {
            http_request = http_request.query(&[("include", include.join(","))]);
        }
        if let Some(token) = &request.token {
            http_request = http_request.query(&[("marker", token.as_str())]);
        }
        if let Some(hint) = request.page_size_hint {
            http_request = http_request.query(&[("maxresults", hint.get())]);
        }

        let rsp = http_request.send().await?;
        if rsp.status() != StatusCode::OK {
            return Err(Self::handle_error(rsp, container, None).await);
        }
        let body = rsp.text().await?;
        parse_list_response(&body)
    }
}

#[async_trait]
impl BlobStorageApi for BlobServiceClient {
    async fn create_container(&self, container: &str) -> Result<()> {
        let request = self
            .request(Method::PUT, "create", container, None)
            .await?
            .query(&[("restype", "container")]);

        let response = request.send().await?;
        if response.status() != StatusCode::CREATED {
            Err(Self::handle_error(response, container, None).await)
        } else {
            Ok(())
        }
    }

    async fn delete_container(&self, container: &str) -> Result<()> {
        let request = self
            .request(Method::DELETE, "delete", container, None)
            .await?
            .query(&[("restype", "container")]);

        let response = request.send().await?;
        if response.status() != StatusCode::ACCEPTED {
            Err(Self::handle_error(response, container, None).await)
        } else {
            Ok(())
        }
    }

    async fn put(
        &self,
        container: &str,
        blob: &str,
        body: impl Into<Body> + Send,
        options: PutBlobOptions,
    ) -> Result<PutBlobResult> {
        let mut request = self
            .request(Method::PUT, "put", container, Some(blob))
            .await?
            .header("x-ms-blob-type", "BlockBlob");

        if let Some(content_type) = options.content_type {
            request = request.header("x-ms-blob-content-type", content_type);
        }

        if let Some(cache_control) = options.cache_control {
            request = request.header("x-ms-blob-cache-control", cache_control);
        }

        let response = request.body(body).send().await?;
        if response.status() != StatusCode::CREATED {
            Err(Self::handle_error(response, container, Some(blob)).await)
        } else {
            let headers = response.headers();
            Ok(PutBlobResult {
                url: self.url(container, Some(blob)),
                etag: header_string(headers, "etag"),
                last_modified: header_string(headers, "last-modified")
                    .as_deref()
                    .and_then(parse_http_date),
            })
        }
    }

    async fn head(&self, container: &str, blob: &str) -> Result<Option<BlobProperties>> {
        let request = self
            .request(Method::HEAD, "head", container, Some(blob))
            .await?;

        let response = request.send().await?;

        if response.status() != StatusCode::OK {
            let err = Self::handle_error(response, container, Some(blob)).await;
            match err {
                BlobServiceError::BlobNotFound(_) => Ok(None),
                _ => Err(err),
            }
        } else {
            let headers = response.headers();
            Ok(Some(BlobProperties {
                url: self.url(container, Some(blob)),
                content_length: header_string(headers, "content-length")
                    .and_then(|len| len.parse().ok())
                    .unwrap_or(0),
                content_type: header_string(headers, "content-type"),
                etag: header_string(headers, "etag"),
                last_modified: header_string(headers, "last-modified")
                    .as_deref()
                    .and_then(parse_http_date),
            }))
        }
    }

    async fn download(
        &self,
        container: &str,
        blob: &str,
        options: DownloadOptions,
    ) -> Result<Bytes> {
        if let Some(byte_range) = &options.byte_range {
            if byte_range.start > byte_range.end {
                return Err(BlobServiceError::InvalidInput(format!(
                    "byte range {}..{} ends before it starts",
                    byte_range.start, byte_range.end
                )));
            }
        }

        let mut request = self
            .request(Method::GET, "download", container, Some(blob))
            .await?;

        if let Some(byte_range) = options.byte_range {
            if byte_range.start == byte_range.end {
                return Ok(Bytes::new());
            }
            // Need to subtract 1 from byte_range.end because HTTP range headers are inclusive
            // and rust ranges are not.
            request = request.header(
                "x-ms-range",
                format!("bytes={}-{}", byte_range.start, byte_range.end - 1),
            );
        }

        let response = request.send().await?;

        if response.status() != StatusCode::OK && response.status() != StatusCode::PARTIAL_CONTENT {
            Err(Self::handle_error(response, container, Some(blob)).await)
        } else {
            Ok(response.bytes().await?)
        }
    }

    async fn del(&self, container: &str, blob: &str, options: DeleteBlobOptions) -> Result<()> {
        let mut request = self
            .request(Method::DELETE, "del", container, Some(blob))
            .await?;

        if options.include_snapshots {
            request = request.header("x-ms-delete-snapshots", "include");
        }

        let response = request.send().await?;

        if response.status() != StatusCode::ACCEPTED {
            Err(Self::handle_error(response, container, Some(blob)).await)
        } else {
            Ok(())
        }
    }
}

/// Options for the put operation
#[derive(Debug, Default)]
pub struct PutBlobOptions {
    /// Specify the content type of the blob
    /// If not specified the service stores application/octet-stream
    pub content_type: Option<String>,
    /// Value the service returns as Cache-Control when the blob is read
    pub cache_control: Option<String>,
}

/// The response from the put operation
#[derive(Debug)]
pub struct PutBlobResult {
    /// The URL of the uploaded blob
    pub url: String,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Response from the head operation
#[derive(Debug)]
pub struct BlobProperties {
    /// The URL of the blob
    pub url: String,
    /// The size of the blob in bytes
    pub content_length: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    /// The time the blob was last written
    pub last_modified: Option<DateTime<Utc>>,
}

/// Options for the download operation
#[derive(Debug, Default)]
pub struct DownloadOptions {
    /// The range of bytes to download.  If not specified then the entire blob
    /// is downloaded.  A range that ends before it starts is rejected.  The start of the range must be less than the # of bytes
    /// in the blob or an error will be returned.  The end of the range may be
    /// greater than the number of bytes in the blob.
    pub byte_range: Option<Range<usize>>,
}

/// Options for the del operation
#[derive(Debug, Default)]
pub struct DeleteBlobOptions {
    /// Delete the blob's snapshots along with it.  The service refuses to
    /// delete a blob that has snapshots unless this is set.
    pub include_snapshots: bool,
}
