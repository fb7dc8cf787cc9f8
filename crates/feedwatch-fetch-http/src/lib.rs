// # HTTP Feed Fetcher
//
// This crate provides the HTTP-based feed fetcher for the feedwatch system.
//
// ## Purpose
//
// Retrieves raw feed documents over HTTP(S) with a local freshness cache so
// that upstream feeds are not re-downloaded when they haven't changed:
//
// 1. A `HEAD` probe checks the document before any transfer
// 2. If the remote `Content-Length` matches the cached copy on disk, the
//    cached body is served without a download
// 3. Otherwise, if the remote `ETag` matches the sidecar recorded on the
//    last download, the cached body is served without a download
// 4. Only then is the body downloaded, cached, and the ETag sidecar updated
//
// Serving the cached body (rather than skipping the feed) keeps runs
// idempotent: reprocessing an unchanged snapshot produces no transitions.
//
// ## Cache layout
//
// One file per feed URL under the configured cache directory:
//
// ```text
// {cache_dir}/{urlsafe_base64(url)}.txt        cached body
// {cache_dir}/{urlsafe_base64(url)}.txt.etag   ETag sidecar
// ```
//
// ## Status handling
//
// - 404: the feed is gone upstream; logged and reported as no data
// - 403: logged and the download is attempted anyway (some hosts reject
//   HEAD but serve GET)
// - other non-2xx on the probe: an error, retried by the engine

use feedwatch_core::ComponentRegistry;
use feedwatch_core::config::{FeedDescriptor, FetcherConfig};
use feedwatch_core::traits::{FeedFetcher, FeedFetcherFactory, FeedSnapshot};
use feedwatch_core::{Error, Result};

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use tokio::fs;

/// User-Agent sent on every probe and download
const USER_AGENT: &str = concat!("feedwatch/", env!("CARGO_PKG_VERSION"));

/// Default request timeout when none is configured
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP feed fetcher with a local freshness cache
pub struct HttpFeedFetcher {
    /// Directory for cached bodies and ETag sidecars
    cache_dir: PathBuf,

    /// HTTP client (shared connection pool)
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    /// Create a new HTTP fetcher caching under `cache_dir`
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed; a degraded client
    /// without the User-Agent and timeout would violate the fetch contract.
    pub fn new(cache_dir: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::fetch(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            client,
        })
    }

    /// Cache file path for a feed URL
    ///
    /// URLs are not valid filenames, so the URL is URL-safe base64 encoded
    /// (unpadded) and suffixed with `.txt`.
    fn cache_path(&self, url: &str) -> PathBuf {
        let encoded = URL_SAFE_NO_PAD.encode(url.as_bytes());
        self.cache_dir.join(format!("{}.txt", encoded))
    }

    fn etag_path(cache_path: &Path) -> PathBuf {
        let mut path = cache_path.as_os_str().to_owned();
        path.push(".etag");
        PathBuf::from(path)
    }

    /// Read the cached body for a URL, if any
    async fn read_cached(&self, cache_path: &Path) -> Option<String> {
        fs::read_to_string(cache_path).await.ok()
    }

    async fn read_etag(etag_path: &Path) -> Option<String> {
        fs::read_to_string(etag_path).await.ok()
    }

    async fn write_cache(
        &self,
        cache_path: &Path,
        body: &str,
        etag: Option<&str>,
    ) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).await.map_err(|e| {
            Error::fetch(format!(
                "Failed to create cache directory {}: {}",
                self.cache_dir.display(),
                e
            ))
        })?;

        fs::write(cache_path, body).await.map_err(|e| {
            Error::fetch(format!(
                "Failed to write cache file {}: {}",
                cache_path.display(),
                e
            ))
        })?;

        if let Some(etag) = etag {
            let etag_path = Self::etag_path(cache_path);
            fs::write(&etag_path, etag).await.map_err(|e| {
                Error::fetch(format!(
                    "Failed to write ETag sidecar {}: {}",
                    etag_path.display(),
                    e
                ))
            })?;
            tracing::debug!("ETag recorded: {}", etag);
        }

        Ok(())
    }
}

/// Strip explicit default ports so equivalent URLs share a cache entry
fn normalize_url(url: &str) -> String {
    url.replace(":80/", "/").replace(":443/", "/")
}

#[async_trait::async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, feed: &FeedDescriptor) -> Result<Option<FeedSnapshot>> {
        let url = normalize_url(&feed.url);
        let cache_path = self.cache_path(&url);
        let etag_path = Self::etag_path(&cache_path);

        tracing::info!("Checking freshness: {}", url);
        let probe = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|e| Error::fetch(format!("HEAD {} failed: {}", url, e)))?;

        let status = probe.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::FORBIDDEN {
                // Some hosts reject HEAD but serve GET; try the download
                tracing::warn!("Forbidden (HEAD): {}", url);
            } else if status == reqwest::StatusCode::NOT_FOUND {
                tracing::warn!("Not found: {}", url);
                return Ok(None);
            } else {
                return Err(Error::fetch(format!(
                    "Unexpected HTTP status {} for {}",
                    status, url
                )));
            }
        }

        let remote_len: Option<u64> = probe
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let remote_etag: Option<String> = probe
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        // Content-Length short-circuit: cached copy is already current
        if let Some(remote_len) = remote_len.filter(|len| *len > 0) {
            if let Ok(meta) = fs::metadata(&cache_path).await {
                if meta.len() == remote_len {
                    tracing::info!("Not modified: {}", url);
                    if let Some(cached) = self.read_cached(&cache_path).await {
                        return Ok(Some(FeedSnapshot::new(cached)));
                    }
                }
            }
        }

        // ETag short-circuit against the sidecar from the last download
        if let Some(remote_etag) = remote_etag.as_deref() {
            if let Some(local_etag) = Self::read_etag(&etag_path).await {
                if local_etag == remote_etag {
                    tracing::info!("Cached (ETag match): {}", url);
                    if let Some(cached) = self.read_cached(&cache_path).await {
                        return Ok(Some(FeedSnapshot::new(cached)));
                    }
                }
            }
        }

        tracing::info!("Downloading: {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::fetch(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::warn!("Not found: {}", url);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::fetch(format!(
                "Unexpected HTTP status {} for {}",
                status, url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::fetch(format!("Failed to read body of {}: {}", url, e)))?;

        // The prior cached body gives the engine its net-new diff view
        let previous = self.read_cached(&cache_path).await;
        self.write_cache(&cache_path, &body, remote_etag.as_deref())
            .await?;

        Ok(Some(match previous {
            Some(previous) => FeedSnapshot::with_previous(body, previous),
            None => FeedSnapshot::new(body),
        }))
    }

    fn fetcher_name(&self) -> &'static str {
        "http"
    }
}

/// Factory for creating HTTP feed fetchers
pub struct HttpFetcherFactory;

impl FeedFetcherFactory for HttpFetcherFactory {
    fn create(&self, config: &FetcherConfig) -> Result<Box<dyn FeedFetcher>> {
        match config {
            FetcherConfig::Http {
                cache_dir,
                timeout_secs,
            } => {
                let timeout = if *timeout_secs > 0 {
                    Duration::from_secs(*timeout_secs)
                } else {
                    Duration::from_secs(DEFAULT_TIMEOUT_SECS)
                };
                Ok(Box::new(HttpFeedFetcher::new(cache_dir, timeout)?))
            }
            _ => Err(Error::config("Invalid config for HTTP feed fetcher")),
        }
    }
}

/// Register the HTTP feed fetcher with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_fetcher("http", Box::new(HttpFetcherFactory));
}
