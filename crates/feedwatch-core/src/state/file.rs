// # File State Store
//
// File-based implementation of StateStore with atomic whole-document
// writes.
//
// ## Key layout
//
// Rooted at a configured directory, mirroring the composite-key layout of
// an object store:
//
// ```text
// {dir}/{environment}/feeds/{source}/{feed_name}/state.json
// {dir}/{environment}/feeds/{source}/{feed_name}/{YYYYMMDDHH}.txt   (archives)
// ```
//
// ## Durability
//
// - Atomic writes: state is written to a temporary file, then renamed
// - Corruption tolerance: a document that fails to parse is logged and
//   treated as "no prior state" (the engine bootstraps), never a hard
//   error

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::model::FeedState;
use crate::traits::state_store::{StateStore, StateStoreFactory};

/// File-based state store
///
/// One JSON document per feed, replaced atomically on every save.
///
/// # Example
///
/// ```rust,no_run
/// use feedwatch_core::state::FileStateStore;
/// use feedwatch_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/feedwatch", "production");
///     let state = store.load("talosintelligence.com", "ipreputation").await?;
///     assert!(state.is_none()); // nothing persisted yet
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileStateStore {
    root: PathBuf,
    environment: String,
}

impl FileStateStore {
    /// Create a store rooted at `root` for the given environment
    pub fn new(root: impl AsRef<Path>, environment: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            environment: environment.into(),
        }
    }

    fn feed_dir(&self, source: &str, feed_name: &str) -> PathBuf {
        self.root
            .join(&self.environment)
            .join("feeds")
            .join(source)
            .join(feed_name)
    }

    fn state_path(&self, source: &str, feed_name: &str) -> PathBuf {
        self.feed_dir(source, feed_name).join("state.json")
    }

    async fn write_atomic(&self, path: &Path, contents: &str) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut temp = path.to_path_buf();
        temp.set_extension("tmp");
        {
            let mut file = fs::File::create(&temp).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp.display(),
                    e
                ))
            })?;
            file.write_all(contents.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write temp file {}: {}",
                    temp.display(),
                    e
                ))
            })?;
            file.flush().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp.display(),
                    e
                ))
            })?;
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp, path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp.display(),
                path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn exists(&self, source: &str, feed_name: &str) -> Result<bool, Error> {
        Ok(self.state_path(source, feed_name).exists())
    }

    async fn load(&self, source: &str, feed_name: &str) -> Result<Option<FeedState>, Error> {
        let path = self.state_path(source, feed_name);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("State document does not exist: {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::state_store(format!(
                    "Failed to read state document {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        match serde_json::from_str::<FeedState>(&content) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                // Malformed state is recoverable: the engine bootstraps
                tracing::warn!(
                    "State document {} is malformed ({}), treating as no prior state",
                    path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, state: &FeedState) -> Result<(), Error> {
        let path = self.state_path(&state.source, &state.feed_name);
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {}", e)))?;

        self.write_atomic(&path, &json).await?;
        tracing::trace!("State written to {}", path.display());
        Ok(())
    }

    async fn delete(&self, source: &str, feed_name: &str) -> Result<(), Error> {
        let path = self.state_path(source, feed_name);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::state_store(format!(
                "Failed to delete state document {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn archive_snapshot(
        &self,
        source: &str,
        feed_name: &str,
        stamp: &str,
        raw: &str,
    ) -> Result<(), Error> {
        let path = self.feed_dir(source, feed_name).join(format!("{}.txt", stamp));
        self.write_atomic(&path, raw).await
    }
}

/// Factory for creating file state stores from configuration
pub struct FileStateStoreFactory;

impl StateStoreFactory for FileStateStoreFactory {
    fn create(
        &self,
        config: &crate::config::StateStoreConfig,
        environment: &str,
    ) -> Result<Box<dyn StateStore>, Error> {
        match config {
            crate::config::StateStoreConfig::File { dir } => {
                Ok(Box::new(FileStateStore::new(dir, environment)))
            }
            _ => Err(Error::config("Invalid config for file state store")),
        }
    }
}
