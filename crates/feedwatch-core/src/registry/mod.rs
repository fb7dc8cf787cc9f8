//! Plugin-based component registry
//!
//! The registry allows feed fetchers, event sinks, and state stores to be
//! registered dynamically at runtime, avoiding hardcoded if-else chains in
//! the invocation wrapper.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use feedwatch_core::registry::ComponentRegistry;
//!
//! let registry = ComponentRegistry::new();
//! registry.register_state_store("file", Box::new(FileStateStoreFactory));
//!
//! let store = registry.create_state_store(&config, "production")?;
//! ```
//!
//! Implementation crates should expose a `register()` function that adds
//! their factories during initialization.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::config::{FetcherConfig, SinkConfig, StateStoreConfig};
use crate::error::{Error, Result};
use crate::traits::{EventSink, FeedFetcher, StateStore};
use crate::traits::{EventSinkFactory, FeedFetcherFactory, StateStoreFactory};

/// Registry for plugin-based component creation
///
/// Maintains maps of type names to factory objects, allowing dynamic
/// instantiation based on configuration. Uses interior mutability with
/// RwLock, allowing concurrent reads and exclusive writes.
#[derive(Default)]
pub struct ComponentRegistry {
    /// Registered feed fetcher factories
    fetchers: RwLock<HashMap<String, Box<dyn FeedFetcherFactory>>>,

    /// Registered event sink factories
    sinks: RwLock<HashMap<String, Box<dyn EventSinkFactory>>>,

    /// Registered state store factories
    state_stores: RwLock<HashMap<String, Box<dyn StateStoreFactory>>>,
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a feed fetcher factory
    pub fn register_fetcher(&self, name: impl Into<String>, factory: Box<dyn FeedFetcherFactory>) {
        let mut fetchers = self.fetchers.write().unwrap();
        fetchers.insert(name.into(), factory);
    }

    /// Register an event sink factory
    pub fn register_sink(&self, name: impl Into<String>, factory: Box<dyn EventSinkFactory>) {
        let mut sinks = self.sinks.write().unwrap();
        sinks.insert(name.into(), factory);
    }

    /// Register a state store factory
    pub fn register_state_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn StateStoreFactory>,
    ) {
        let mut stores = self.state_stores.write().unwrap();
        stores.insert(name.into(), factory);
    }

    /// Create a feed fetcher from configuration
    ///
    /// # Errors
    ///
    /// Fails if the fetcher type is not registered or creation fails.
    pub fn create_fetcher(&self, config: &FetcherConfig) -> Result<Box<dyn FeedFetcher>> {
        let fetcher_type = config.type_name();
        let fetchers = self.fetchers.read().unwrap();

        let factory = fetchers
            .get(fetcher_type)
            .ok_or_else(|| Error::config(format!("Unknown fetcher type: {}", fetcher_type)))?;

        factory.create(config)
    }

    /// Create an event sink from configuration
    pub fn create_sink(&self, config: &SinkConfig) -> Result<Box<dyn EventSink>> {
        let sink_type = config.type_name();
        let sinks = self.sinks.read().unwrap();

        let factory = sinks
            .get(sink_type)
            .ok_or_else(|| Error::config(format!("Unknown sink type: {}", sink_type)))?;

        factory.create(config)
    }

    /// Create a state store from configuration
    pub fn create_state_store(
        &self,
        config: &StateStoreConfig,
        environment: &str,
    ) -> Result<Box<dyn StateStore>> {
        let store_type = config.type_name();
        let stores = self.state_stores.read().unwrap();

        let factory = stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown state store type: {}", store_type)))?;

        factory.create(config, environment)
    }

    /// List all registered fetcher types
    pub fn list_fetchers(&self) -> Vec<String> {
        self.fetchers.read().unwrap().keys().cloned().collect()
    }

    /// List all registered sink types
    pub fn list_sinks(&self) -> Vec<String> {
        self.sinks.read().unwrap().keys().cloned().collect()
    }

    /// List all registered state store types
    pub fn list_state_stores(&self) -> Vec<String> {
        self.state_stores.read().unwrap().keys().cloned().collect()
    }

    /// Check if a fetcher type is registered
    pub fn has_fetcher(&self, name: &str) -> bool {
        self.fetchers.read().unwrap().contains_key(name)
    }

    /// Check if a sink type is registered
    pub fn has_sink(&self, name: &str) -> bool {
        self.sinks.read().unwrap().contains_key(name)
    }

    /// Check if a state store type is registered
    pub fn has_state_store(&self, name: &str) -> bool {
        self.state_stores.read().unwrap().contains_key(name)
    }
}

/// Register the built-in core components (memory/file stores, null sink)
pub fn register_builtin(registry: &ComponentRegistry) {
    registry.register_state_store("file", Box::new(crate::state::FileStateStoreFactory));
    registry.register_state_store("memory", Box::new(crate::state::MemoryStateStoreFactory));
    registry.register_sink("null", Box::new(crate::traits::NullSinkFactory));
}
