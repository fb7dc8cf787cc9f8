//! Test doubles and common utilities for architecture contract tests
//!
//! This module provides minimal test doubles that verify architectural
//! constraints without any real network or disk I/O.

use feedwatch_core::config::{FeedDescriptor, FeedwatchConfig};
use feedwatch_core::error::{Error, Result};
use feedwatch_core::model::{ChangeEvent, FeedState};
use feedwatch_core::traits::{EventSink, FeedFetcher, FeedSnapshot, StateStore};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A fetcher that replays a scripted sequence of responses
///
/// Each call to `fetch` pops the next scripted response. Running past the
/// end of the script yields `Ok(None)` ("no data this run").
pub struct ScriptedFetcher {
    script: Arc<Mutex<VecDeque<Result<Option<FeedSnapshot>>>>>,
    fetch_call_count: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Result<Option<FeedSnapshot>>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            fetch_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Script of plain snapshots, one per run
    pub fn with_snapshots(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|text| Ok(Some(FeedSnapshot::new(*text))))
                .collect(),
        )
    }

    /// Get the number of times fetch() was called
    pub fn fetch_call_count(&self) -> usize {
        self.fetch_call_count.load(Ordering::SeqCst)
    }

    /// Create a new ScriptedFetcher that shares the script and counters
    /// with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            script: Arc::clone(&other.script),
            fetch_call_count: Arc::clone(&other.fetch_call_count),
        }
    }
}

#[async_trait::async_trait]
impl FeedFetcher for ScriptedFetcher {
    async fn fetch(&self, _feed: &FeedDescriptor) -> Result<Option<FeedSnapshot>> {
        self.fetch_call_count.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    fn fetcher_name(&self) -> &'static str {
        "scripted"
    }
}

/// An event sink that records every emitted event and can inject failures
pub struct CountingSink {
    emitted: Arc<Mutex<Vec<ChangeEvent>>>,
    emit_call_count: Arc<AtomicUsize>,
    /// Number of upcoming emit calls that should fail
    fail_next: Arc<AtomicUsize>,
}

impl CountingSink {
    pub fn new() -> Self {
        Self {
            emitted: Arc::new(Mutex::new(Vec::new())),
            emit_call_count: Arc::new(AtomicUsize::new(0)),
            fail_next: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make the next `n` emit calls fail
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Get the number of times emit() was called (including failures)
    pub fn emit_call_count(&self) -> usize {
        self.emit_call_count.load(Ordering::SeqCst)
    }

    /// Events that were successfully delivered
    pub fn emitted(&self) -> Vec<ChangeEvent> {
        self.emitted.lock().unwrap().clone()
    }

    /// Keys of successfully delivered events, in emission order
    pub fn emitted_keys(&self) -> Vec<String> {
        self.emitted
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.key.clone())
            .collect()
    }

    /// Create a new CountingSink that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            emitted: Arc::clone(&other.emitted),
            emit_call_count: Arc::clone(&other.emit_call_count),
            fail_next: Arc::clone(&other.fail_next),
        }
    }
}

#[async_trait::async_trait]
impl EventSink for CountingSink {
    async fn emit(&self, event: &ChangeEvent) -> Result<()> {
        self.emit_call_count.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::sink("injected delivery failure"));
        }

        self.emitted.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "counting"
    }
}

/// An in-memory state store with injectable save failures
pub struct FlakyStateStore {
    states: Arc<Mutex<HashMap<(String, String), FeedState>>>,
    save_call_count: Arc<AtomicUsize>,
    fail_saves: Arc<AtomicUsize>,
}

impl FlakyStateStore {
    pub fn new() -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            save_call_count: Arc::new(AtomicUsize::new(0)),
            fail_saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make the next `n` save calls fail
    pub fn fail_next_saves(&self, n: usize) {
        self.fail_saves.store(n, Ordering::SeqCst);
    }

    /// Get the number of times save() was called (including failures)
    pub fn save_call_count(&self) -> usize {
        self.save_call_count.load(Ordering::SeqCst)
    }

    /// Direct view of the persisted state, for assertions
    pub fn persisted(&self, source: &str, feed_name: &str) -> Option<FeedState> {
        self.states
            .lock()
            .unwrap()
            .get(&(source.to_string(), feed_name.to_string()))
            .cloned()
    }

    /// Create a new FlakyStateStore that shares state and counters with an
    /// existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            states: Arc::clone(&other.states),
            save_call_count: Arc::clone(&other.save_call_count),
            fail_saves: Arc::clone(&other.fail_saves),
        }
    }
}

#[async_trait::async_trait]
impl StateStore for FlakyStateStore {
    async fn exists(&self, source: &str, feed_name: &str) -> Result<bool> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .contains_key(&(source.to_string(), feed_name.to_string())))
    }

    async fn load(&self, source: &str, feed_name: &str) -> Result<Option<FeedState>> {
        Ok(self.persisted(source, feed_name))
    }

    async fn save(&self, state: &FeedState) -> Result<()> {
        self.save_call_count.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_saves.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_saves.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::state_store("injected save failure"));
        }

        self.states.lock().unwrap().insert(
            (state.source.clone(), state.feed_name.clone()),
            state.clone(),
        );
        Ok(())
    }

    async fn delete(&self, source: &str, feed_name: &str) -> Result<()> {
        self.states
            .lock()
            .unwrap()
            .remove(&(source.to_string(), feed_name.to_string()));
        Ok(())
    }

    async fn archive_snapshot(
        &self,
        _source: &str,
        _feed_name: &str,
        _stamp: &str,
        _raw: &str,
    ) -> Result<()> {
        Ok(())
    }
}

/// The feed every contract test tracks
pub fn test_feed() -> FeedDescriptor {
    FeedDescriptor::new(
        "talosintelligence.com",
        "ipreputation",
        "https://www.talosintelligence.com/documents/ip-blacklist",
    )
}

/// Helper to create a minimal FeedwatchConfig for testing
///
/// Retries are disabled so fetch errors surface immediately without
/// sleeping in tests.
pub fn minimal_config() -> FeedwatchConfig {
    let mut config = FeedwatchConfig::new();
    config.feeds.push(test_feed());
    config.engine.max_retries = 0;
    config.engine.retry_delay_secs = 1;
    config
}
