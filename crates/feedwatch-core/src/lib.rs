// # feedwatch-core
//
// Core library for the feedwatch feed-tracking system.
//
// ## Architecture Overview
//
// This library ingests plaintext threat-intelligence feeds (one IP address
// or CIDR block per line, `#` comments) and tracks which entries are new,
// which re-appeared, and which dropped out since the last run:
//
// - **parser**: Turns raw feed text into normalized address identities
// - **differ**: Set-difference between two raw feed snapshots
// - **model**: Durable per-feed state (`FeedState`, `TrackedRecord`) and
//   the outbound `ChangeEvent` view
// - **engine**: The transition state machine (bootstrap, exits, entrances,
//   persist, emit) orchestrated per feed
// - **traits**: Seams for the external collaborators: `FeedFetcher`,
//   `StateStore`, `EventSink`
// - **registry**: Plugin-based factory registry for fetchers, sinks, and
//   state stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Transition logic is pure; I/O lives
//    behind the seam traits
// 2. **Idempotency**: Re-running against an unchanged feed produces zero
//    entrants and zero exits
// 3. **At-most-once transitions**: State is persisted atomically before any
//    event is emitted; a persist failure aborts the run with nothing sent
// 4. **Library-First**: All core functionality can be used as a library

pub mod traits;
pub mod engine;
pub mod parser;
pub mod differ;
pub mod model;
pub mod registry;
pub mod config;
pub mod error;
pub mod state;

// Re-export core types for convenience
pub use traits::{EventSink, FeedFetcher, StateStore};
pub use engine::{EngineEvent, FeedEngine};
pub use parser::AddressIdentity;
pub use model::{ChangeEvent, FeedState, TrackedRecord};
pub use registry::ComponentRegistry;
pub use config::{FeedDescriptor, FeedwatchConfig, FetcherConfig, SinkConfig, StateStoreConfig};
pub use error::{Error, Result};
pub use state::{FileStateStore, MemoryStateStore};
