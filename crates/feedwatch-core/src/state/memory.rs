// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Purpose
//
// Fast, non-persistent state for tests and ephemeral runs. All state is
// lost on restart; the first run after a restart bootstraps every feed
// (which, by design, suppresses entrance events).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::FeedState;
use crate::traits::state_store::{StateStore, StateStoreFactory};

/// In-memory state store implementation
///
/// Cloning yields a handle to the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    states: Arc<RwLock<HashMap<(String, String), FeedState>>>,
    archives: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of feed state documents held
    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    /// Check if the store holds no state
    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }

    /// Archived snapshot keys, for test assertions
    pub async fn archive_keys(&self) -> Vec<String> {
        self.archives.read().await.keys().cloned().collect()
    }

    /// Drop all state
    pub async fn clear(&self) {
        self.states.write().await.clear();
        self.archives.write().await.clear();
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn exists(&self, source: &str, feed_name: &str) -> Result<bool, Error> {
        let guard = self.states.read().await;
        Ok(guard.contains_key(&(source.to_string(), feed_name.to_string())))
    }

    async fn load(&self, source: &str, feed_name: &str) -> Result<Option<FeedState>, Error> {
        let guard = self.states.read().await;
        Ok(guard.get(&(source.to_string(), feed_name.to_string())).cloned())
    }

    async fn save(&self, state: &FeedState) -> Result<(), Error> {
        let mut guard = self.states.write().await;
        guard.insert(
            (state.source.clone(), state.feed_name.clone()),
            state.clone(),
        );
        Ok(())
    }

    async fn delete(&self, source: &str, feed_name: &str) -> Result<(), Error> {
        let mut guard = self.states.write().await;
        guard.remove(&(source.to_string(), feed_name.to_string()));
        Ok(())
    }

    async fn archive_snapshot(
        &self,
        source: &str,
        feed_name: &str,
        stamp: &str,
        raw: &str,
    ) -> Result<(), Error> {
        let mut guard = self.archives.write().await;
        guard.insert(format!("{}/{}/{}", source, feed_name, stamp), raw.to_string());
        Ok(())
    }
}

/// Factory for creating memory state stores from configuration
pub struct MemoryStateStoreFactory;

impl StateStoreFactory for MemoryStateStoreFactory {
    fn create(
        &self,
        config: &crate::config::StateStoreConfig,
        _environment: &str,
    ) -> Result<Box<dyn StateStore>, Error> {
        match config {
            crate::config::StateStoreConfig::Memory => Ok(Box::new(MemoryStateStore::new())),
            _ => Err(Error::config("Invalid config for memory state store")),
        }
    }
}
