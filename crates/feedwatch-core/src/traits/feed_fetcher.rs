// # Feed Fetcher Trait
//
// Defines the interface for retrieving raw feed documents.
//
// ## Implementations
//
// - HTTP with local freshness cache: `feedwatch-fetch-http` crate
// - Test doubles: scripted fetchers in the contract tests
//
// ## Responsibility boundary
//
// Fetchers retrieve bytes, nothing more. They must not:
// - Parse feed content (owned by the parser)
// - Implement retry logic (owned by `FeedEngine`)
// - Touch the state store or emit events
//
// A fetcher reports "no data this run" with `Ok(None)`, for example on a
// 404, or when a freshness probe shows the cached copy is current and the
// caller opted out of reprocessing. The engine treats `Ok(None)` as zero
// results: the feed is skipped without touching persisted state.

use async_trait::async_trait;

use crate::config::FeedDescriptor;

/// A raw feed document as fetched, with the prior snapshot when available
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshot {
    /// The current raw feed text (UTF-8)
    pub text: String,

    /// The previously fetched raw text for the same feed, if the fetcher
    /// keeps one (used for the net-new-since-last-fetch diff view)
    pub previous_text: Option<String>,
}

impl FeedSnapshot {
    /// Snapshot with no known prior text
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            previous_text: None,
        }
    }

    /// Snapshot carrying the prior raw text
    pub fn with_previous(text: impl Into<String>, previous: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            previous_text: Some(previous.into()),
        }
    }
}

/// Trait for feed fetcher implementations
///
/// Implementations must be thread-safe and usable across async tasks.
/// A single `fetch` call performs at most one logical retrieval; bounded
/// retries with backoff are applied by the engine, not the fetcher.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch the current raw document for a feed
    ///
    /// # Returns
    ///
    /// - `Ok(Some(snapshot))`: The feed document was retrieved
    /// - `Ok(None)`: No data this run (e.g., 404, nothing changed)
    /// - `Err(Error)`: Retrieval failed; the engine may retry
    async fn fetch(&self, feed: &FeedDescriptor) -> Result<Option<FeedSnapshot>, crate::Error>;

    /// Get the fetcher name (for logging/debugging)
    fn fetcher_name(&self) -> &'static str;
}

/// Helper trait for constructing fetchers from configuration
pub trait FeedFetcherFactory: Send + Sync {
    /// Create a FeedFetcher instance from configuration
    fn create(
        &self,
        config: &crate::config::FetcherConfig,
    ) -> Result<Box<dyn FeedFetcher>, crate::Error>;
}
