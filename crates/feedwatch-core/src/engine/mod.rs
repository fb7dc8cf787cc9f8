//! Feed transition engine
//!
//! The FeedEngine is responsible for, per feed per run:
//! - Fetching the raw feed snapshot via FeedFetcher (bounded retries)
//! - Parsing and deduplicating entries
//! - Computing exits and entrances against the loaded FeedState
//! - Persisting the updated state atomically
//! - Emitting one ChangeEvent per entrant, after persistence
//!
//! ## Record state machine
//!
//! ```text
//! ABSENT ──entrance──▶ CURRENT ──exit──▶ EXITED
//!                         ▲                │
//!                         └──re-entrance───┘
//! ```
//!
//! Records persist indefinitely and may cycle between CURRENT and EXITED
//! arbitrarily many times. Exits are state-only; only entrances produce
//! events.
//!
//! ## Run algorithm
//!
//! 1. Bootstrap: no prior state → every entry becomes a current record;
//!    no events are emitted for bootstrap entries
//! 2. Exit detection: current records absent from the snapshot exit
//! 3. Entrance detection: unknown entries become new records, exited
//!    entries re-enter; both are entrants
//! 4. Persist: whole state saved atomically; a save failure aborts the
//!    run before any event is emitted
//!
//! One `now` is captured per run (UTC, second granularity) so every
//! transition recorded in a single run carries the same timestamp.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{FeedDescriptor, FeedwatchConfig};
use crate::differ;
use crate::error::Result;
use crate::model::{ChangeEvent, FeedState, TrackedRecord, utc_now};
use crate::parser::parse_feed;
use crate::traits::{EventSink, FeedFetcher, FeedSnapshot, StateStore};

/// Events emitted by the FeedEngine for external observability
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A batch run started
    BatchStarted {
        feeds: usize,
    },

    /// A feed produced no work this run (disabled, or no data)
    FeedSkipped {
        feed_name: String,
        reason: String,
    },

    /// A feed had no prior state and was bootstrapped
    Bootstrapped {
        feed_name: String,
        records: usize,
    },

    /// Addresses in the raw text that were absent from the previous fetch
    SnapshotDelta {
        feed_name: String,
        net_new: Vec<String>,
    },

    /// A feed run completed and was persisted
    RunCompleted {
        feed_name: String,
        entrants: usize,
        exits: usize,
    },

    /// A change event could not be delivered (state already durable)
    EmitFailed {
        feed_name: String,
        key: String,
        error: String,
    },

    /// A batch run finished
    BatchCompleted {
        feeds: usize,
        failures: usize,
    },
}

/// One parsed, deduplicated feed entry with its attached payload
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    /// Canonical address key
    pub key: String,

    /// Raw intelligence payload for this address/feed observation
    pub payload: serde_json::Value,
}

/// Exits and entrants produced by one application of a snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionOutcome {
    /// Record snapshots at the moment of entrance (new or re-entrance)
    pub entrants: Vec<TrackedRecord>,

    /// Keys that transitioned out of "current" this run
    pub exits: Vec<String>,
}

/// Summary of one feed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub feed_name: String,
    pub entrants: usize,
    pub exits: usize,
    pub bootstrapped: bool,
    pub skipped: bool,
}

impl RunSummary {
    fn skipped(feed: &FeedDescriptor) -> Self {
        Self {
            feed_name: feed.name.clone(),
            entrants: 0,
            exits: 0,
            bootstrapped: false,
            skipped: true,
        }
    }
}

/// Summary of a whole batch run
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Per-feed summaries for feeds that ran to completion
    pub runs: Vec<RunSummary>,

    /// Number of feeds whose run failed (logged, never cascading)
    pub failures: usize,
}

/// Parse a raw snapshot into entries, deduplicated by canonical key
///
/// First occurrence wins; input order is preserved. Each entry carries the
/// payload that would accompany it downstream (address, category, and the
/// observation timestamp).
pub fn snapshot_entries(
    feed: &FeedDescriptor,
    text: &str,
    now: DateTime<Utc>,
) -> Vec<FeedEntry> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();

    for address in parse_feed(text) {
        let key = address.canonical_key();
        if !seen.insert(key.clone()) {
            continue;
        }
        let payload = serde_json::json!({
            "ip_address": key,
            "category": feed.name,
            "last_seen": now.to_rfc3339(),
        });
        entries.push(FeedEntry { key, payload });
    }

    entries
}

/// Initialize state on the first-ever run for a feed
///
/// Every entry becomes a record with `current=true`, `first_seen=now`, and
/// a single entrance timestamp. Bootstrap produces no entrants: the
/// initial load is suppressed to avoid flooding downstream.
pub fn bootstrap_state(
    feed: &FeedDescriptor,
    entries: &[FeedEntry],
    now: DateTime<Utc>,
) -> FeedState {
    let mut state = FeedState::new(feed);
    for entry in entries {
        state.records.insert(
            entry.key.clone(),
            TrackedRecord::new(entry.key.clone(), now, entry.payload.clone()),
        );
    }
    state
}

/// Apply a deduplicated snapshot to existing state
///
/// Computes exits (step 2) then entrances (step 3) per the run algorithm.
/// The caller is responsible for persisting the mutated state and only
/// then acting on the returned entrants.
pub fn apply_snapshot(
    state: &mut FeedState,
    entries: &[FeedEntry],
    now: DateTime<Utc>,
) -> TransitionOutcome {
    let index: HashSet<&str> = entries.iter().map(|e| e.key.as_str()).collect();

    let mut exits = Vec::new();
    for (key, record) in state.records.iter_mut() {
        if record.current && !index.contains(key.as_str()) {
            record.mark_exit(now);
            exits.push(key.clone());
        }
    }

    let mut entrants = Vec::new();
    for entry in entries {
        match state.records.get_mut(&entry.key) {
            // Already tracked and current: not a new entrance
            Some(record) if record.current => {}
            // Previously exited: re-entrance
            Some(record) => {
                record.mark_entrance(now, entry.payload.clone());
                entrants.push(record.clone());
            }
            // Unknown address: new record
            None => {
                let record = TrackedRecord::new(entry.key.clone(), now, entry.payload.clone());
                state.records.insert(entry.key.clone(), record.clone());
                entrants.push(record);
            }
        }
    }

    TransitionOutcome { entrants, exits }
}

/// Core feed transition engine
///
/// One engine instance processes a configured set of feeds, one feed at a
/// time. Per feed, the engine exclusively owns the loaded FeedState for
/// the duration of the run (single-writer model); a batch never processes
/// the same feed twice concurrently.
pub struct FeedEngine {
    /// Fetcher for raw feed documents
    fetcher: Box<dyn FeedFetcher>,

    /// Persistent per-feed state
    store: Box<dyn StateStore>,

    /// Downstream change-event sink
    sink: Box<dyn EventSink>,

    /// Feeds to process
    feeds: Vec<FeedDescriptor>,

    /// Maximum fetch attempts per feed
    max_retries: usize,

    /// Delay between fetch retries (in seconds)
    retry_delay_secs: u64,

    /// Whether to archive each run's raw text
    archive_snapshots: bool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl FeedEngine {
    /// Create a new feed engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields
    /// engine observability events.
    pub fn new(
        fetcher: Box<dyn FeedFetcher>,
        store: Box<dyn StateStore>,
        sink: Box<dyn EventSink>,
        config: FeedwatchConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            fetcher,
            store,
            sink,
            feeds: config.feeds,
            max_retries: config.engine.max_retries,
            retry_delay_secs: config.engine.retry_delay_secs,
            archive_snapshots: config.engine.archive_snapshots,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Process every configured feed once, sequentially
    ///
    /// Per-feed failures are contained: a failed feed is logged and
    /// counted, and the batch continues with the remaining feeds.
    pub async fn run_batch(&self) -> BatchSummary {
        self.emit_event(EngineEvent::BatchStarted {
            feeds: self.feeds.len(),
        });

        let mut summary = BatchSummary::default();
        for feed in &self.feeds {
            match self.run_feed(feed).await {
                Ok(run) => {
                    debug!("done {}", feed.name);
                    summary.runs.push(run);
                }
                Err(e) => {
                    error!("Feed {} run failed: {}", feed.name, e);
                    summary.failures += 1;
                }
            }
        }

        self.emit_event(EngineEvent::BatchCompleted {
            feeds: self.feeds.len(),
            failures: summary.failures,
        });
        summary
    }

    /// Run the full transition algorithm for one feed
    ///
    /// # Errors
    ///
    /// Returns an error on state-store failure (load or save). A save
    /// failure aborts the run before any event is emitted, so the next
    /// run recomputes from the last successfully persisted state.
    pub async fn run_feed(&self, feed: &FeedDescriptor) -> Result<RunSummary> {
        if !feed.enabled {
            info!("{} disabled", feed.name);
            self.emit_event(EngineEvent::FeedSkipped {
                feed_name: feed.name.clone(),
                reason: "disabled".to_string(),
            });
            return Ok(RunSummary::skipped(feed));
        }

        // A failed fetch is "no data this run": zero entrants, no state
        // mutation, other feeds unaffected.
        let Some(snapshot) = self.fetch_with_retry(feed).await else {
            self.emit_event(EngineEvent::FeedSkipped {
                feed_name: feed.name.clone(),
                reason: "no data".to_string(),
            });
            return Ok(RunSummary::skipped(feed));
        };

        let now = utc_now();

        if self.archive_snapshots {
            let stamp = now.format("%Y%m%d%H").to_string();
            if let Err(e) = self
                .store
                .archive_snapshot(&feed.source, &feed.name, &stamp, &snapshot.text)
                .await
            {
                // Archives are best-effort; the transition run proceeds
                warn!("Failed to archive snapshot for {}: {}", feed.name, e);
            }
        }

        self.report_net_new(feed, &snapshot);

        let entries = snapshot_entries(feed, &snapshot.text, now);
        info!("Parsed {} records for {}", entries.len(), feed.name);

        // A tracked feed whose snapshot parses to nothing is almost always
        // an upstream error page served with a 200, not a genuinely empty
        // feed. Exiting every record here would flood downstream with
        // re-entrance events on the next good fetch, so the run is skipped.
        if entries.is_empty() && self.store.exists(&feed.source, &feed.name).await? {
            warn!(
                "Snapshot for {} parsed to zero entries, skipping run",
                feed.name
            );
            self.emit_event(EngineEvent::FeedSkipped {
                feed_name: feed.name.clone(),
                reason: "empty snapshot".to_string(),
            });
            return Ok(RunSummary::skipped(feed));
        }

        let (mut state, outcome, bootstrapped) =
            match self.store.load(&feed.source, &feed.name).await? {
                None => {
                    warn!("No prior state for {}/{}, bootstrapping", feed.source, feed.name);
                    let state = bootstrap_state(feed, &entries, now);
                    self.emit_event(EngineEvent::Bootstrapped {
                        feed_name: feed.name.clone(),
                        records: state.records.len(),
                    });
                    (state, TransitionOutcome::default(), true)
                }
                Some(mut state) => {
                    let outcome = apply_snapshot(&mut state, &entries, now);
                    (state, outcome, false)
                }
            };

        state.last_checked = Some(now);

        // Persist before emission: a failure here means nothing was sent
        // and the next run recomputes from the previous durable state.
        self.store.save(&state).await?;

        for record in &outcome.entrants {
            let event = ChangeEvent::new(feed, record);
            if let Err(e) = self.sink.emit(&event).await {
                warn!("Failed to emit {} for {}: {}", record.key, feed.name, e);
                self.emit_event(EngineEvent::EmitFailed {
                    feed_name: feed.name.clone(),
                    key: record.key.clone(),
                    error: e.to_string(),
                });
            }
        }

        info!(
            "Detected {} entrants, {} exits for {}",
            outcome.entrants.len(),
            outcome.exits.len(),
            feed.name
        );
        self.emit_event(EngineEvent::RunCompleted {
            feed_name: feed.name.clone(),
            entrants: outcome.entrants.len(),
            exits: outcome.exits.len(),
        });

        Ok(RunSummary {
            feed_name: feed.name.clone(),
            entrants: outcome.entrants.len(),
            exits: outcome.exits.len(),
            bootstrapped,
            skipped: false,
        })
    }

    /// Fetch with bounded retries and a fixed delay
    ///
    /// Exhausted retries degrade to `None` ("no data this run") rather
    /// than an error; fetch failures never fail a feed run.
    async fn fetch_with_retry(&self, feed: &FeedDescriptor) -> Option<FeedSnapshot> {
        for attempt in 0..=self.max_retries {
            match self.fetcher.fetch(feed).await {
                Ok(result) => return result,
                Err(e) => {
                    warn!("Fetch attempt {} failed for {}: {}", attempt, feed.name, e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(tokio::time::Duration::from_secs(
                            self.retry_delay_secs,
                        ))
                        .await;
                    }
                }
            }
        }
        None
    }

    /// Delta against the last fetched raw text, reported for monitoring
    fn report_net_new(&self, feed: &FeedDescriptor, snapshot: &FeedSnapshot) {
        if let Some(previous) = &snapshot.previous_text {
            let net_new: Vec<String> = differ::diff(previous, &snapshot.text)
                .iter()
                .map(|a| a.canonical_key())
                .collect();
            debug!(
                "{} net-new addresses for {} since last fetch",
                net_new.len(),
                feed.name
            );
            self.emit_event(EngineEvent::SnapshotDelta {
                feed_name: feed.name.clone(),
                net_new,
            });
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full or closed, dropping engine event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_feed() -> FeedDescriptor {
        FeedDescriptor::new(
            "talosintelligence.com",
            "ipreputation",
            "https://www.talosintelligence.com/documents/ip-blacklist",
        )
    }

    #[test]
    fn test_snapshot_entries_dedup_first_wins() {
        let feed = test_feed();
        let now = utc_now();
        let entries = snapshot_entries(&feed, "1.2.3.4\n5.6.7.8\n1.2.3.4\n", now);
        let keys: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["1.2.3.4", "5.6.7.8"]);
        assert_eq!(entries[0].payload["category"], "ipreputation");
    }

    #[test]
    fn test_bootstrap_creates_current_records_without_entrants() {
        let feed = test_feed();
        let now = utc_now();
        let entries = snapshot_entries(&feed, "1.2.3.4\n5.6.7.8\n", now);

        let state = bootstrap_state(&feed, &entries, now);
        assert_eq!(state.records.len(), 2);
        for record in state.records.values() {
            assert!(record.current);
            assert_eq!(record.first_seen, now);
            assert_eq!(record.entrances, vec![now]);
            assert!(record.exits.is_empty());
        }
    }

    #[test]
    fn test_exit_and_entrance_example_scenario() {
        // previous = {1.2.3.4, 5.6.7.8} current; new fetch = {5.6.7.8, 9.9.9.9}
        let feed = test_feed();
        let t0 = utc_now();
        let initial = snapshot_entries(&feed, "1.2.3.4\n5.6.7.8\n", t0);
        let mut state = bootstrap_state(&feed, &initial, t0);

        let t1 = t0 + chrono::Duration::seconds(60);
        let entries = snapshot_entries(&feed, "5.6.7.8\n9.9.9.9\n", t1);
        let outcome = apply_snapshot(&mut state, &entries, t1);

        assert_eq!(outcome.exits, vec!["1.2.3.4".to_string()]);
        let exited = &state.records["1.2.3.4"];
        assert!(!exited.current);
        assert_eq!(exited.exits, vec![t1]);

        assert_eq!(outcome.entrants.len(), 1);
        assert_eq!(outcome.entrants[0].key, "9.9.9.9");
        assert_eq!(state.records["9.9.9.9"].first_seen, t1);

        // 5.6.7.8 untouched: already current, no-op
        let unchanged = &state.records["5.6.7.8"];
        assert!(unchanged.current);
        assert_eq!(unchanged.entrances, vec![t0]);
        assert!(unchanged.exits.is_empty());
    }

    #[test]
    fn test_re_entrance_appends_entrance_only() {
        let feed = test_feed();
        let t0 = utc_now();
        let mut state = bootstrap_state(&feed, &snapshot_entries(&feed, "1.2.3.4\n", t0), t0);

        // Address drops out
        let t1 = t0 + chrono::Duration::seconds(60);
        let outcome = apply_snapshot(&mut state, &[], t1);
        assert_eq!(outcome.exits, vec!["1.2.3.4".to_string()]);
        assert!(outcome.entrants.is_empty());

        // Address comes back
        let t2 = t0 + chrono::Duration::seconds(120);
        let entries = snapshot_entries(&feed, "1.2.3.4\n", t2);
        let outcome = apply_snapshot(&mut state, &entries, t2);

        assert_eq!(outcome.entrants.len(), 1);
        let record = &state.records["1.2.3.4"];
        assert!(record.current);
        assert_eq!(record.entrances, vec![t0, t2]);
        assert_eq!(record.exits, vec![t1]);
        assert_eq!(record.first_seen, t0);
    }

    #[test]
    fn test_noop_run_is_idempotent() {
        let feed = test_feed();
        let t0 = utc_now();
        let entries = snapshot_entries(&feed, "1.2.3.4\n5.6.7.8\n", t0);
        let mut state = bootstrap_state(&feed, &entries, t0);
        let before = state.records.clone();

        let t1 = t0 + chrono::Duration::seconds(60);
        let entries = snapshot_entries(&feed, "1.2.3.4\n5.6.7.8\n", t1);
        let outcome = apply_snapshot(&mut state, &entries, t1);

        assert!(outcome.entrants.is_empty());
        assert!(outcome.exits.is_empty());
        assert_eq!(state.records, before);
    }

    #[test]
    fn test_entrance_exit_conservation() {
        let feed = test_feed();
        let t0 = utc_now();
        let mut state = bootstrap_state(
            &feed,
            &snapshot_entries(&feed, "1.1.1.1\n2.2.2.2\n3.3.3.3\n", t0),
            t0,
        );

        let t1 = t0 + chrono::Duration::seconds(60);
        let entries = snapshot_entries(&feed, "2.2.2.2\n4.4.4.4\n5.5.5.5\n", t1);
        let current_before = 3usize;
        let overlap = 1usize; // only 2.2.2.2

        let outcome = apply_snapshot(&mut state, &entries, t1);

        assert_eq!(outcome.exits.len(), current_before - overlap);
        assert_eq!(outcome.entrants.len(), entries.len() - overlap);
    }

    #[test]
    fn test_exit_timestamp_follows_preceding_entrance() {
        let feed = test_feed();
        let t0 = utc_now();
        let mut state = bootstrap_state(&feed, &snapshot_entries(&feed, "1.2.3.4\n", t0), t0);

        let t1 = t0 + chrono::Duration::seconds(30);
        apply_snapshot(&mut state, &[], t1);

        let record = &state.records["1.2.3.4"];
        assert!(record.first_seen <= *record.entrances.iter().min().unwrap());
        assert!(record.exits[0] > record.entrances[0]);
    }
}
