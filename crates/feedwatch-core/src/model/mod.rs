//! Durable state model
//!
//! One `FeedState` document per feed, holding one `TrackedRecord` per
//! address ever observed in that feed. The whole document is persisted as
//! a unit (replace-whole-object semantics) at the end of each run.
//!
//! ## Timestamps
//!
//! All timestamps are UTC with sub-second precision truncated, so that
//! persisted documents compare stably across save/load cycles.
//!
//! ## Invariants
//!
//! - Entrances and exits strictly interleave: after the first entrance,
//!   an exit may only follow an entrance and vice versa
//! - An exit is appended only on a `current=true -> false` transition
//! - A record that has ever been current has at least one entrance

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::FeedDescriptor;

/// Current UTC time, truncated to whole seconds
pub fn utc_now() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

/// One address under observation for a given feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedRecord {
    /// Canonical address string, identical to the map key
    pub key: String,

    /// When this address was first observed in the feed
    pub first_seen: DateTime<Utc>,

    /// Whether the address is present in the latest snapshot
    pub current: bool,

    /// Timestamps of every transition into "current"
    pub entrances: Vec<DateTime<Utc>>,

    /// Timestamps of every transition out of "current"
    pub exits: Vec<DateTime<Utc>>,

    /// The raw intelligence record attached at the latest entrance
    /// (owned by this record, never aliased to parser output)
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl TrackedRecord {
    /// Create a record for an address entering observation now
    ///
    /// # Visibility
    ///
    /// `pub(crate)` so records can only be born through the transition
    /// engine, which is what keeps the interleaving invariant honest.
    pub(crate) fn new(key: String, now: DateTime<Utc>, payload: serde_json::Value) -> Self {
        Self {
            key,
            first_seen: now,
            current: true,
            entrances: vec![now],
            exits: vec![],
            payload,
        }
    }

    /// Transition `current -> exited`, appending an exit timestamp
    pub(crate) fn mark_exit(&mut self, now: DateTime<Utc>) {
        debug_assert!(self.current, "exit requires a current record");
        self.current = false;
        self.exits.push(now);
    }

    /// Transition `exited -> current`, appending an entrance timestamp
    pub(crate) fn mark_entrance(&mut self, now: DateTime<Utc>, payload: serde_json::Value) {
        debug_assert!(!self.current, "re-entrance requires an exited record");
        self.current = true;
        self.entrances.push(now);
        self.payload = payload;
    }
}

/// Durable aggregate for one feed
///
/// Owned exclusively by the transition engine for the duration of a run;
/// saved atomically as a whole document, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedState {
    /// Feed source (e.g., "talosintelligence.com")
    pub source: String,

    /// Feed name within the source
    pub feed_name: String,

    /// Fetch URL recorded at bootstrap
    pub url: String,

    /// Canonical address key -> tracked record
    ///
    /// A BTreeMap keeps serialization deterministic, so persisting,
    /// reloading, and re-persisting a state document is byte-stable.
    pub records: BTreeMap<String, TrackedRecord>,

    /// When this feed was last processed
    pub last_checked: Option<DateTime<Utc>>,
}

impl FeedState {
    /// Create an empty state document for a feed
    pub fn new(feed: &FeedDescriptor) -> Self {
        Self {
            source: feed.source.clone(),
            feed_name: feed.name.clone(),
            url: feed.url.clone(),
            records: BTreeMap::new(),
            last_checked: None,
        }
    }

    /// Number of records currently marked present in the feed
    pub fn current_count(&self) -> usize {
        self.records.values().filter(|r| r.current).count()
    }
}

/// Outbound change event: one per entrant, produced after persistence
///
/// A derived view merging the feed identity with a record snapshot at the
/// moment of entrance. Never stored by this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Feed source
    pub source: String,

    /// Feed name
    pub feed_name: String,

    /// Feed URL
    pub feed_url: String,

    /// Canonical address key
    pub key: String,

    /// First observation timestamp
    pub first_seen: DateTime<Utc>,

    /// Membership flag (always true at the moment of entrance)
    pub current: bool,

    /// Entrance history
    pub entrances: Vec<DateTime<Utc>>,

    /// Exit history
    pub exits: Vec<DateTime<Utc>>,

    /// Attached intelligence payload
    pub payload: serde_json::Value,
}

impl ChangeEvent {
    /// Merge a feed descriptor with a record snapshot
    pub fn new(feed: &FeedDescriptor, record: &TrackedRecord) -> Self {
        Self {
            source: feed.source.clone(),
            feed_name: feed.name.clone(),
            feed_url: feed.url.clone(),
            key: record.key.clone(),
            first_seen: record.first_seen,
            current: record.current,
            entrances: record.entrances.clone(),
            exits: record.exits.clone(),
            payload: record.payload.clone(),
        }
    }
}
