//! HTTP transport used by the cache coordinator.
//!
//! The coordinator never talks to the network directly. It hands a fully
//! decorated [`reqwest::Request`] to a [`Transport`] and gets back a status,
//! the response headers, and a body that is only read when asked for.
//!
//! ### Responsibilities of the transport
//! - Timeouts and redirect limits
//! - Body size limit (default 5MB)
//! - No retries; a failed request surfaces as `TRANSPORT_ERROR`/`TRANSPORT_TIMEOUT`

use bytes::Bytes;
use etagcache_core::{AppConfig, Error};
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, Request, StatusCode};
use std::time::{Duration, Instant};

/// Executes requests on behalf of the cache.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the response without consuming its body.
    async fn execute(&self, request: Request) -> Result<TransportResponse, Error>;
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// User agent string (default: "etagcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for TransportConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

enum ResponseBody {
    Pending { response: reqwest::Response, max_bytes: usize },
    Buffered(Bytes),
}

/// Status, headers and a lazily read body.
pub struct TransportResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl TransportResponse {
    /// Response with an already buffered body.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: ResponseBody::Buffered(body.into()) }
    }

    /// Wrap a reqwest response; the body is read later, up to `max_bytes`.
    pub fn from_reqwest(response: reqwest::Response, max_bytes: usize) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        Self { status, headers, body: ResponseBody::Pending { response, max_bytes } }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Read the whole body as text. Invalid UTF-8 is replaced.
    pub async fn text(self) -> Result<String, Error> {
        let bytes = match self.body {
            ResponseBody::Buffered(bytes) => bytes,
            ResponseBody::Pending { response, max_bytes } => read_limited(response, max_bytes).await?,
        };
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// The `ETag` value in `headers`, if present, valid text, and non-empty.
pub fn etag(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ETAG)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

async fn read_limited(response: reqwest::Response, max_bytes: usize) -> Result<Bytes, Error> {
    if let Some(len) = response.content_length()
        && len > max_bytes as u64
    {
        return Err(Error::BodyTooLarge(format!("{} bytes exceeds {}", len, max_bytes)));
    }

    let bytes = response.bytes().await.map_err(transport_error)?;

    if bytes.len() > max_bytes {
        return Err(Error::BodyTooLarge(format!("{} bytes exceeds {}", bytes.len(), max_bytes)));
    }

    Ok(bytes)
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::TransportTimeout(err.to_string())
    } else {
        Error::Transport(format!("network error: {}", err))
    }
}

/// Transport backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    config: TransportConfig,
}

impl HttpTransport {
    /// Create a new transport with the given configuration.
    pub fn new(config: TransportConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request) -> Result<TransportResponse, Error> {
        let start = Instant::now();
        let method = request.method().clone();
        let url = request.url().clone();

        let response = self.http.execute(request).await.map_err(transport_error)?;

        tracing::debug!(
            "{} {} -> {} in {}ms",
            method,
            url,
            response.status().as_u16(),
            start.elapsed().as_millis()
        );

        Ok(TransportResponse::from_reqwest(response, self.config.max_bytes))
    }
}
