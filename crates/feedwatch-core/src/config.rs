//! Configuration types for the feedwatch system
//!
//! All configuration is carried in explicit structs passed to components at
//! construction; there is no process-wide mutable configuration state.

use serde::{Deserialize, Serialize};

/// Main feedwatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedwatchConfig {
    /// Feed fetcher configuration
    pub fetcher: FetcherConfig,

    /// State store configuration
    pub state_store: StateStoreConfig,

    /// Change-event sink configuration
    pub sink: SinkConfig,

    /// Feeds to track
    pub feeds: Vec<FeedDescriptor>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl FeedwatchConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            state_store: StateStoreConfig::default(),
            sink: SinkConfig::default(),
            feeds: Vec::new(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.feeds.is_empty() {
            return Err(crate::Error::config("No feeds configured"));
        }

        for feed in &self.feeds {
            feed.validate()?;
        }

        self.fetcher.validate()?;
        self.sink.validate()?;

        Ok(())
    }
}

impl Default for FeedwatchConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Static description of one tracked feed
///
/// Loaded once at process start; never mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedDescriptor {
    /// Feed source (e.g., "talosintelligence.com")
    pub source: String,

    /// Feed name within the source (e.g., "ipreputation")
    pub name: String,

    /// Fetch URL for the plaintext feed document
    pub url: String,

    /// Whether this feed is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl FeedDescriptor {
    /// Create a new enabled feed descriptor
    pub fn new(
        source: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            url: url.into(),
            enabled: true,
        }
    }

    /// Enable or disable the feed
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Validate the descriptor
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.source.is_empty() {
            return Err(crate::Error::config("Feed source cannot be empty"));
        }
        if self.name.is_empty() {
            return Err(crate::Error::config("Feed name cannot be empty"));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "Feed URL must use HTTP or HTTPS scheme: {}",
                self.url
            )));
        }
        Ok(())
    }
}

/// Feed fetcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetcherConfig {
    /// HTTP fetcher with local freshness cache
    Http {
        /// Directory for cached feed bodies and ETag sidecars
        cache_dir: String,
        /// Request timeout in seconds
        timeout_secs: u64,
    },

    /// Custom fetcher
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl FetcherConfig {
    /// Validate the fetcher configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            FetcherConfig::Http {
                cache_dir,
                timeout_secs,
            } => {
                if cache_dir.is_empty() {
                    return Err(crate::Error::config("HTTP fetcher cache_dir cannot be empty"));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("HTTP fetcher timeout must be > 0"));
                }
                Ok(())
            }
            FetcherConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom fetcher factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom fetcher config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the fetcher type name
    pub fn type_name(&self) -> &str {
        match self {
            FetcherConfig::Http { .. } => "http",
            FetcherConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        FetcherConfig::Http {
            cache_dir: "/tmp/feedwatch".to_string(),
            timeout_secs: 30,
        }
    }
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Root directory for state documents and snapshot archives
        dir: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,

    /// Custom state store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StateStoreConfig {
    /// Get the state store type name
    pub fn type_name(&self) -> &str {
        match self {
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
            StateStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Change-event sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// HTTP webhook sink (one POST per entrant)
    Webhook {
        /// Endpoint URL
        url: String,
    },

    /// Discard sink (logs entrants, sends nothing)
    Null,

    /// Custom sink
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SinkConfig {
    /// Validate the sink configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SinkConfig::Webhook { url } => {
                if url.is_empty() {
                    return Err(crate::Error::config("Webhook sink URL cannot be empty"));
                }
                Ok(())
            }
            SinkConfig::Null => Ok(()),
            SinkConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom sink factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom sink config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the sink type name
    pub fn type_name(&self) -> &str {
        match self {
            SinkConfig::Webhook { .. } => "webhook",
            SinkConfig::Null => "null",
            SinkConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Null
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deployment environment, used as the leading state-store key segment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Maximum number of fetch attempts per feed per run
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Delay between fetch retries (in seconds)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Whether to archive each run's raw fetched text
    #[serde(default)]
    pub archive_snapshots: bool,

    /// Capacity of the internal observability event channel
    ///
    /// When full, new engine events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            archive_snapshots: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_event_channel_capacity() -> usize {
    1000
}
