// # State Store Trait
//
// Defines the interface for persistent per-feed state management.
//
// ## Purpose
//
// The state store holds one `FeedState` document per feed. The engine's
// at-most-once guarantee rests on two properties implementations must
// provide:
//
// - **Atomic whole-document save**: a reader never observes a partially
//   written state document
// - **Corruption tolerance on load**: a missing or malformed document is
//   reported as `Ok(None)` (and logged), never as a hard error; the
//   engine responds by bootstrapping
//
// ## Key layout
//
// Documents are addressed by `{environment}/feeds/{source}/{feed_name}/
// state.json`; raw snapshot archives live next to them under a
// timestamped key (`{YYYYMMDDHH}.txt`), write-only from the core's
// perspective.
//
// ## Implementations
//
// - File-based: `state::FileStateStore` (temp-write-then-rename)
// - In-memory: `state::MemoryStateStore` (tests, ephemeral runs)

use async_trait::async_trait;

use crate::model::FeedState;

/// Trait for state store implementations
///
/// All methods must be safe to call concurrently from multiple tasks,
/// though the engine serializes access per feed for the duration of a run.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Check whether a state document exists for a feed
    async fn exists(&self, source: &str, feed_name: &str) -> Result<bool, crate::Error>;

    /// Load the state document for a feed
    ///
    /// # Returns
    ///
    /// - `Ok(Some(state))`: The persisted state
    /// - `Ok(None)`: No prior state (missing or malformed document)
    /// - `Err(Error)`: Storage error (I/O other than not-found)
    async fn load(&self, source: &str, feed_name: &str) -> Result<Option<FeedState>, crate::Error>;

    /// Persist a whole state document atomically
    ///
    /// Replace-whole-object semantics: the previous document is overwritten
    /// as one unit, never patched.
    async fn save(&self, state: &FeedState) -> Result<(), crate::Error>;

    /// Delete the state document for a feed
    ///
    /// The engine never calls this; it exists for operational tooling.
    async fn delete(&self, source: &str, feed_name: &str) -> Result<(), crate::Error>;

    /// Archive one run's raw fetched text under a timestamped key
    ///
    /// Write-only: the core never reads archives back.
    async fn archive_snapshot(
        &self,
        source: &str,
        feed_name: &str,
        stamp: &str,
        raw: &str,
    ) -> Result<(), crate::Error>;
}

/// Helper trait for constructing state stores from configuration
pub trait StateStoreFactory: Send + Sync {
    /// Create a StateStore instance from configuration
    ///
    /// The `environment` becomes the leading key segment for every
    /// document the store manages.
    fn create(
        &self,
        config: &crate::config::StateStoreConfig,
        environment: &str,
    ) -> Result<Box<dyn StateStore>, crate::Error>;
}
