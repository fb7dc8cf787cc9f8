//! Architectural Contract Test: Emission Failure Containment
//!
//! Constraints verified:
//! - A failed emission never fails the feed run (state is already durable)
//! - Every entrant gets its own emit attempt even when earlier ones fail
//! - Failed emissions are observable on the engine event channel
//! - A failed emission is not retried on the next run (at-most-once)
//!
//! If this test fails, one flaky downstream consumer can wedge feed
//! processing or cause duplicate deliveries.

mod common;

use common::*;
use feedwatch_core::FeedEngine;
use feedwatch_core::engine::EngineEvent;

#[tokio::test]
async fn one_failed_emit_does_not_block_the_rest() {
    let fetcher = ScriptedFetcher::with_snapshots(&[
        "# empty\n",
        "1.1.1.1\n2.2.2.2\n3.3.3.3\n",
    ]);
    let sink = CountingSink::new();
    let sink_view = CountingSink::sharing_counters_with(&sink);

    let (engine, mut events) = FeedEngine::new(
        Box::new(fetcher),
        Box::new(FlakyStateStore::new()),
        Box::new(sink),
        minimal_config(),
    )
    .expect("engine construction succeeds");

    engine.run_feed(&test_feed()).await.expect("bootstrap run");

    sink_view.fail_next(1);
    let summary = engine.run_feed(&test_feed()).await.expect("run succeeds");

    assert_eq!(summary.entrants, 3);
    assert_eq!(
        sink_view.emit_call_count(),
        3,
        "every entrant gets an emit attempt"
    );
    assert_eq!(
        sink_view.emitted().len(),
        2,
        "the two emissions after the failure are delivered"
    );

    // The failure is observable for monitoring
    drop(engine);
    let mut emit_failures = 0;
    while let Some(event) = events.recv().await {
        if matches!(event, EngineEvent::EmitFailed { .. }) {
            emit_failures += 1;
        }
    }
    assert_eq!(emit_failures, 1);
}

#[tokio::test]
async fn failed_emission_is_not_retried_next_run() {
    // At-most-once: the transition is durable, so a lost event stays lost
    let fetcher = ScriptedFetcher::with_snapshots(&[
        "# empty\n",
        "1.2.3.4\n",
        "1.2.3.4\n",
    ]);
    let sink = CountingSink::new();
    let sink_view = CountingSink::sharing_counters_with(&sink);

    let (engine, _events) = FeedEngine::new(
        Box::new(fetcher),
        Box::new(FlakyStateStore::new()),
        Box::new(sink),
        minimal_config(),
    )
    .expect("engine construction succeeds");

    engine.run_feed(&test_feed()).await.expect("bootstrap run");

    sink_view.fail_next(1);
    let summary = engine.run_feed(&test_feed()).await.expect("entrance run");
    assert_eq!(summary.entrants, 1);
    assert!(sink_view.emitted().is_empty());

    // Unchanged snapshot: the address is already current, no re-emission
    let summary = engine.run_feed(&test_feed()).await.expect("third run");
    assert_eq!(summary.entrants, 0);
    assert_eq!(
        sink_view.emit_call_count(),
        1,
        "the lost event must not be re-sent"
    );
}
