//! Architectural Contract Test: Retry Ownership
//!
//! Constraints verified:
//! - The engine owns fetch retries; a transient fetch error followed by a
//!   success still processes the feed
//! - Exhausted retries degrade to "no data this run": the feed is skipped
//!   and persisted state is untouched
//! - `Ok(None)` from the fetcher (404, nothing changed) skips the feed
//!   without consuming retries
//!
//! If this test fails, either fetchers are retrying internally or a flaky
//! upstream can corrupt feed state.

mod common;

use common::*;
use feedwatch_core::FeedEngine;
use feedwatch_core::error::Error;
use feedwatch_core::traits::FeedSnapshot;

#[tokio::test(start_paused = true)]
async fn transient_fetch_error_is_retried() {
    let fetcher = ScriptedFetcher::new(vec![
        Err(Error::fetch("connection reset")),
        Ok(Some(FeedSnapshot::new("1.2.3.4\n"))),
    ]);
    let fetcher_view = ScriptedFetcher::sharing_counters_with(&fetcher);
    let store = FlakyStateStore::new();
    let store_view = FlakyStateStore::sharing_counters_with(&store);

    let mut config = minimal_config();
    config.engine.max_retries = 2;

    let (engine, _events) = FeedEngine::new(
        Box::new(fetcher),
        Box::new(store),
        Box::new(CountingSink::new()),
        config,
    )
    .expect("engine construction succeeds");

    let summary = engine.run_feed(&test_feed()).await.expect("run succeeds");

    assert!(!summary.skipped);
    assert_eq!(fetcher_view.fetch_call_count(), 2);

    let feed = test_feed();
    assert!(store_view.persisted(&feed.source, &feed.name).is_some());
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_skip_without_state_mutation() {
    let fetcher = ScriptedFetcher::new(vec![
        Err(Error::fetch("connection reset")),
        Err(Error::fetch("connection reset")),
        Err(Error::fetch("connection reset")),
    ]);
    let fetcher_view = ScriptedFetcher::sharing_counters_with(&fetcher);
    let store = FlakyStateStore::new();
    let store_view = FlakyStateStore::sharing_counters_with(&store);

    let mut config = minimal_config();
    config.engine.max_retries = 2;

    let (engine, _events) = FeedEngine::new(
        Box::new(fetcher),
        Box::new(store),
        Box::new(CountingSink::new()),
        config,
    )
    .expect("engine construction succeeds");

    let summary = engine.run_feed(&test_feed()).await.expect("run succeeds");

    assert!(summary.skipped);
    assert_eq!(fetcher_view.fetch_call_count(), 3, "initial attempt + 2 retries");
    assert_eq!(store_view.save_call_count(), 0);

    let feed = test_feed();
    assert!(store_view.persisted(&feed.source, &feed.name).is_none());
}

#[tokio::test]
async fn no_data_skips_without_retrying() {
    let fetcher = ScriptedFetcher::new(vec![Ok(None)]);
    let fetcher_view = ScriptedFetcher::sharing_counters_with(&fetcher);
    let store = FlakyStateStore::new();
    let store_view = FlakyStateStore::sharing_counters_with(&store);

    let mut config = minimal_config();
    config.engine.max_retries = 3;

    let (engine, _events) = FeedEngine::new(
        Box::new(fetcher),
        Box::new(store),
        Box::new(CountingSink::new()),
        config,
    )
    .expect("engine construction succeeds");

    let summary = engine.run_feed(&test_feed()).await.expect("run succeeds");

    assert!(summary.skipped);
    assert_eq!(fetcher_view.fetch_call_count(), 1, "Ok(None) is not an error");
    assert_eq!(store_view.save_call_count(), 0);
}

#[tokio::test]
async fn disabled_feed_never_touches_collaborators() {
    let fetcher = ScriptedFetcher::with_snapshots(&["1.2.3.4\n"]);
    let fetcher_view = ScriptedFetcher::sharing_counters_with(&fetcher);

    let mut config = minimal_config();
    config.feeds[0].enabled = false;
    let disabled = config.feeds[0].clone();

    let (engine, _events) = FeedEngine::new(
        Box::new(fetcher),
        Box::new(FlakyStateStore::new()),
        Box::new(CountingSink::new()),
        config,
    )
    .expect("engine construction succeeds");

    let summary = engine.run_feed(&disabled).await.expect("run succeeds");

    assert!(summary.skipped);
    assert_eq!(fetcher_view.fetch_call_count(), 0);
}
