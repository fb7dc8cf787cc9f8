//! Core traits for the feedwatch system
//!
//! This module defines the abstract interfaces for the external
//! collaborators the transition engine depends on.
//!
//! - [`FeedFetcher`]: Retrieve raw feed snapshots over the network
//! - [`StateStore`]: Persistent per-feed state management
//! - [`EventSink`]: Deliver change events downstream

pub mod feed_fetcher;
pub mod state_store;
pub mod event_sink;

pub use feed_fetcher::{FeedFetcher, FeedFetcherFactory, FeedSnapshot};
pub use state_store::{StateStore, StateStoreFactory};
pub use event_sink::{EventSink, EventSinkFactory, NullSink, NullSinkFactory};
