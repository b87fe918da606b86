//! Conditional-request cache coordinator.
//!
//! ### Request flow
//! 1. Apply caller headers. For `GET` requests with a stored tag, attach
//!    `If-None-Match: <tag>`; everything else goes out unconditionally.
//! 2. Execute through the [`Transport`]. Transport failures abort the call.
//! 3. `304 Not Modified` records any new `ETag` and replays the cached body
//!    without reading the response body.
//! 4. Any other status reads the body first. Only once it is in hand are the
//!    `ETag` and the body stored, so a failed read leaves the previous tag and
//!    body paired.
//!
//! A failed store write does not fail the request: the body is still returned
//! and the write error is reported in [`CacheResponse::store_error`].

use crate::transport::{self, HttpTransport, Transport, TransportConfig};
use etagcache_core::config::resolve_cache_dir;
use etagcache_core::{AppConfig, BodyStore, Error, EtagStore};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, Request, StatusCode};
use std::path::Path;
use url::Url;

/// Result of one cache-aware request.
#[derive(Debug)]
pub struct CacheResponse {
    /// Status returned by the origin.
    pub status: StatusCode,
    /// Effective body: freshly read, or replayed from the cache on 304.
    pub body: String,
    /// True when the body was replayed from the cache.
    pub revalidated: bool,
    /// Persistence failure, if the stores could not be updated.
    pub store_error: Option<Error>,
}

impl CacheResponse {
    /// The body, or the persistence error if one occurred.
    pub fn into_result(self) -> Result<String, Error> {
        match self.store_error {
            Some(e) => Err(e),
            None => Ok(self.body),
        }
    }
}

/// HTTP client wrapper that revalidates cached bodies with entity tags.
#[derive(Debug, Clone)]
pub struct EtagCache<T = HttpTransport> {
    etags: EtagStore,
    bodies: BodyStore,
    transport: T,
    max_entries: Option<usize>,
}

impl EtagCache<HttpTransport> {
    /// Cache in `dir` (or `./etagcache` when empty) using the default HTTP transport.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, Error> {
        Self::open(&AppConfig::with_cache_dir(dir))
    }

    /// Cache configured from `config`.
    pub fn open(config: &AppConfig) -> Result<Self, Error> {
        let transport = HttpTransport::new(TransportConfig::from(config))?;
        Ok(Self::with_transport(config.cache_dir(), transport).with_max_entries(config.max_entries))
    }
}

impl<T: Transport> EtagCache<T> {
    /// Cache in `dir` (or `./etagcache` when empty) using `transport`.
    pub fn with_transport(dir: impl AsRef<Path>, transport: T) -> Self {
        let dir = resolve_cache_dir(dir.as_ref());
        Self::from_parts(EtagStore::new(&dir), BodyStore::new(&dir), transport)
    }

    /// Cache over already constructed stores.
    pub fn from_parts(etags: EtagStore, bodies: BodyStore, transport: T) -> Self {
        Self { etags, bodies, transport, max_entries: None }
    }

    /// Keep at most `max_entries` bodies, evicting the least recently written.
    pub fn with_max_entries(mut self, max_entries: Option<usize>) -> Self {
        self.max_entries = max_entries.filter(|&n| n > 0);
        self
    }

    pub fn etags(&self) -> &EtagStore {
        &self.etags
    }

    pub fn bodies(&self) -> &BodyStore {
        &self.bodies
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Apply `extra_headers` and, for GET requests with a stored tag, `If-None-Match`.
    pub async fn decorate(&self, request: &mut Request, key: &str, extra_headers: &HeaderMap) {
        request.headers_mut().extend(extra_headers.clone());

        if request.method() != Method::GET {
            return;
        }

        let Some(tag) = self.etags.lookup(key).await else {
            tracing::debug!("no etag for {}, sending unconditionally", key);
            return;
        };

        match HeaderValue::from_str(&tag) {
            Ok(value) => {
                tracing::debug!("revalidating {} with etag {}", key, tag);
                request.headers_mut().insert(header::IF_NONE_MATCH, value);
            }
            Err(e) => tracing::warn!(key, error = %e, "stored etag is not a valid header value"),
        }
    }

    /// Record the response's `ETag` for `key`.
    ///
    /// Returns true if a tag was recorded; a missing or empty header is a no-op.
    pub async fn capture_etag(&self, key: &str, headers: &HeaderMap) -> Result<bool, Error> {
        let Some(tag) = transport::etag(headers) else {
            return Ok(false);
        };
        self.etags.upsert(key, tag).await?;
        Ok(true)
    }

    /// Execute `request` through the cache, indexing it under `key`.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the request could not be executed or its
    /// body could not be read, and `CACHE_MISS` if the origin answered 304 for a
    /// key with no cached body. Store write failures are reported on the
    /// returned [`CacheResponse`] instead.
    pub async fn handle_request(
        &self, mut request: Request, key: &str, extra_headers: &HeaderMap,
    ) -> Result<CacheResponse, Error> {
        self.decorate(&mut request, key, extra_headers).await;

        let response = self.transport.execute(request).await?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            let etag_error = self.record_etag(key, response.headers()).await;
            return self.replay(key, status, etag_error).await;
        }

        let headers = response.headers().clone();
        let body = response.text().await?;
        let etag_error = self.record_etag(key, &headers).await;

        let store_error = match self.bodies.upsert(key, &body).await {
            Ok(()) => self.evict().await.err(),
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to store body");
                self.forget_etag(key).await;
                Some(e)
            }
        };

        tracing::debug!("stored {} bytes for {} (status {})", body.len(), key, status.as_u16());

        Ok(CacheResponse { status, body, revalidated: false, store_error: store_error.or(etag_error) })
    }

    /// GET `url` through the cache, using `url` exactly as given as the key.
    pub async fn get(&self, url: &str, extra_headers: &HeaderMap) -> Result<CacheResponse, Error> {
        let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidUrl(format!("unsupported scheme: {scheme}"))),
        }

        self.handle_request(Request::new(Method::GET, parsed), url, extra_headers)
            .await
    }

    /// Remove `key` from both stores.
    pub async fn invalidate(&self, key: &str) -> Result<(), Error> {
        self.etags.remove(key).await?;
        self.bodies.remove(key).await?;
        Ok(())
    }

    /// Empty both stores. Returns the number of cached bodies removed.
    pub async fn clear(&self) -> Result<u64, Error> {
        self.etags.clear().await?;
        self.bodies.clear().await
    }

    async fn record_etag(&self, key: &str, headers: &HeaderMap) -> Option<Error> {
        match self.capture_etag(key, headers).await {
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to record etag");
                Some(e)
            }
        }
    }

    async fn replay(&self, key: &str, status: StatusCode, etag_error: Option<Error>) -> Result<CacheResponse, Error> {
        let Some(body) = self.bodies.lookup(key).await else {
            tracing::warn!(key, "origin returned 304 but no body is cached");
            self.forget_etag(key).await;
            return Err(Error::CacheMiss(key.to_string()));
        };

        tracing::debug!("cache hit for {}", key);

        // Rewriting the unchanged body marks it as recently used for eviction.
        let store_error = self.bodies.upsert(key, &body).await.err();

        Ok(CacheResponse { status, body, revalidated: true, store_error: store_error.or(etag_error) })
    }

    async fn evict(&self) -> Result<(), Error> {
        let Some(max_entries) = self.max_entries else {
            return Ok(());
        };

        let evicted = self.bodies.evict_oldest(max_entries).await?;
        for key in &evicted {
            self.etags.remove(key).await?;
        }

        if !evicted.is_empty() {
            tracing::debug!("evicted {} cached bodies", evicted.len());
        }
        Ok(())
    }

    /// Drop the tag for `key` so the next request for it is unconditional.
    async fn forget_etag(&self, key: &str) {
        if let Err(e) = self.etags.remove(key).await {
            tracing::warn!(key, error = %e, "failed to drop etag");
        }
    }
}
