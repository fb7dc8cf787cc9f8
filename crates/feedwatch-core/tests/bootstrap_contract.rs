//! Architectural Contract Test: Bootstrap Behavior
//!
//! Constraints verified:
//! - A feed with no prior state is bootstrapped: every entry becomes a
//!   current record, and no change events are emitted
//! - Bootstrap records carry an entrance timestamp, so later exits always
//!   follow an entrance
//! - The run after bootstrap behaves like any other run
//!
//! If this test fails, first-run flood protection is broken.

mod common;

use common::*;
use feedwatch_core::FeedEngine;
use feedwatch_core::engine::EngineEvent;

#[tokio::test]
async fn first_run_bootstraps_without_emitting() {
    let fetcher = ScriptedFetcher::with_snapshots(&["1.2.3.4\n5.6.7.8\n"]);
    let sink = CountingSink::new();
    let store = FlakyStateStore::new();
    let (sink_view, store_view) = (
        CountingSink::sharing_counters_with(&sink),
        FlakyStateStore::sharing_counters_with(&store),
    );

    let (engine, mut events) = FeedEngine::new(
        Box::new(fetcher),
        Box::new(store),
        Box::new(sink),
        minimal_config(),
    )
    .expect("engine construction succeeds");

    let summary = engine.run_feed(&test_feed()).await.expect("run succeeds");

    assert!(summary.bootstrapped);
    assert_eq!(summary.entrants, 0);
    assert_eq!(summary.exits, 0);
    assert_eq!(
        sink_view.emit_call_count(),
        0,
        "bootstrap must not emit change events"
    );

    // Every entry became a current record with a recorded entrance
    let feed = test_feed();
    let state = store_view
        .persisted(&feed.source, &feed.name)
        .expect("state persisted");
    assert_eq!(state.records.len(), 2);
    for record in state.records.values() {
        assert!(record.current);
        assert_eq!(record.entrances.len(), 1);
        assert!(record.exits.is_empty());
    }
    assert!(state.last_checked.is_some());

    // The bootstrap is observable on the engine event channel
    drop(engine);
    let mut saw_bootstrap = false;
    while let Some(event) = events.recv().await {
        if let EngineEvent::Bootstrapped { records, .. } = event {
            assert_eq!(records, 2);
            saw_bootstrap = true;
        }
    }
    assert!(saw_bootstrap);
}

#[tokio::test]
async fn run_after_bootstrap_emits_normally() {
    let fetcher = ScriptedFetcher::with_snapshots(&["1.2.3.4\n", "1.2.3.4\n9.9.9.9\n"]);
    let sink = CountingSink::new();
    let sink_view = CountingSink::sharing_counters_with(&sink);

    let (engine, _events) = FeedEngine::new(
        Box::new(fetcher),
        Box::new(FlakyStateStore::new()),
        Box::new(sink),
        minimal_config(),
    )
    .expect("engine construction succeeds");

    let first = engine.run_feed(&test_feed()).await.expect("run succeeds");
    assert!(first.bootstrapped);

    let second = engine.run_feed(&test_feed()).await.expect("run succeeds");
    assert!(!second.bootstrapped);
    assert_eq!(second.entrants, 1);
    assert_eq!(sink_view.emitted_keys(), vec!["9.9.9.9".to_string()]);
}

#[tokio::test]
async fn empty_feed_bootstraps_to_empty_state() {
    let fetcher = ScriptedFetcher::with_snapshots(&["# header only\n"]);
    let store = FlakyStateStore::new();
    let store_view = FlakyStateStore::sharing_counters_with(&store);

    let (engine, _events) = FeedEngine::new(
        Box::new(fetcher),
        Box::new(store),
        Box::new(CountingSink::new()),
        minimal_config(),
    )
    .expect("engine construction succeeds");

    let summary = engine.run_feed(&test_feed()).await.expect("run succeeds");

    assert!(summary.bootstrapped);
    let feed = test_feed();
    let state = store_view
        .persisted(&feed.source, &feed.name)
        .expect("state persisted");
    assert!(state.records.is_empty());
}
