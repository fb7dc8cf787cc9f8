// # feedwatchd - Feedwatch Daemon
//
// Thin integration layer for the feedwatch system. The daemon is
// responsible for:
//
// 1. Reading configuration from environment variables
// 2. Initializing the runtime and tracing
// 3. Registering fetchers, sinks, and state stores
// 4. Running one batch of feed processing and exiting
//
// All transition logic lives in feedwatch-core; no business logic, parsing
// logic, or retry logic belongs here.
//
// Each invocation processes every configured feed exactly once. Scheduling
// (cron, systemd timers) is external.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Feeds
// - `FEEDWATCH_FEEDS`: Comma-separated `source:name:url` triples, e.g.
//   `talosintelligence.com:ipreputation:https://www.talosintelligence.com/documents/ip-blacklist`
//
// ### Fetcher
// - `FEEDWATCH_FETCHER_TYPE`: Fetcher type (http)
// - `FEEDWATCH_FETCHER_CACHE_DIR`: Directory for the HTTP freshness cache
// - `FEEDWATCH_FETCHER_TIMEOUT_SECS`: Request timeout in seconds
//
// ### State Store
// - `FEEDWATCH_STATE_STORE_TYPE`: Type of state store (file, memory)
// - `FEEDWATCH_STATE_STORE_DIR`: Root directory (for file store)
//
// ### Sink
// - `FEEDWATCH_SINK_TYPE`: Sink type (webhook, null)
// - `FEEDWATCH_SINK_URL`: Endpoint URL (for webhook sink)
//
// ### Engine
// - `FEEDWATCH_ENVIRONMENT`: Deployment environment key segment
// - `FEEDWATCH_MAX_RETRIES`: Maximum fetch attempts per feed
// - `FEEDWATCH_RETRY_DELAY_SECS`: Delay between fetch retries
// - `FEEDWATCH_ARCHIVE_SNAPSHOTS`: Archive raw fetched text (true/false)
// - `FEEDWATCH_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export FEEDWATCH_FEEDS=talosintelligence.com:ipreputation:https://www.talosintelligence.com/documents/ip-blacklist
// export FEEDWATCH_STATE_STORE_TYPE=file
// export FEEDWATCH_STATE_STORE_DIR=/var/lib/feedwatch
// export FEEDWATCH_SINK_TYPE=webhook
// export FEEDWATCH_SINK_URL=https://hooks.example.com/feedwatch
//
// feedwatchd
// ```

use anyhow::Result;
use std::env;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use feedwatch_core::config::{
    FeedDescriptor, FeedwatchConfig, FetcherConfig, SinkConfig, StateStoreConfig,
};
use feedwatch_core::registry::{ComponentRegistry, register_builtin};
use feedwatch_core::{EngineEvent, FeedEngine};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean run
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum FeedwatchExitCode {
    /// Batch completed (individual feed failures are logged, not fatal)
    Clean = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<FeedwatchExitCode> for ExitCode {
    fn from(code: FeedwatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    feeds: Vec<(String, String, String)>,
    fetcher_type: String,
    fetcher_cache_dir: String,
    fetcher_timeout_secs: u64,
    state_store_type: String,
    state_store_dir: Option<String>,
    sink_type: String,
    sink_url: Option<String>,
    environment: String,
    max_retries: usize,
    retry_delay_secs: u64,
    archive_snapshots: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            feeds: env::var("FEEDWATCH_FEEDS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(parse_feed_triple)
                .collect::<Result<Vec<_>>>()?,
            fetcher_type: env::var("FEEDWATCH_FETCHER_TYPE").unwrap_or_else(|_| "http".to_string()),
            fetcher_cache_dir: env::var("FEEDWATCH_FETCHER_CACHE_DIR")
                .unwrap_or_else(|_| "/tmp/feedwatch".to_string()),
            fetcher_timeout_secs: env::var("FEEDWATCH_FETCHER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            state_store_type: env::var("FEEDWATCH_STATE_STORE_TYPE")
                .unwrap_or_else(|_| "file".to_string()),
            state_store_dir: env::var("FEEDWATCH_STATE_STORE_DIR").ok(),
            sink_type: env::var("FEEDWATCH_SINK_TYPE").unwrap_or_else(|_| "null".to_string()),
            sink_url: env::var("FEEDWATCH_SINK_URL").ok(),
            environment: env::var("FEEDWATCH_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            max_retries: env::var("FEEDWATCH_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            retry_delay_secs: env::var("FEEDWATCH_RETRY_DELAY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            archive_snapshots: env::var("FEEDWATCH_ARCHIVE_SNAPSHOTS")
                .map(|s| matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(false),
            log_level: env::var("FEEDWATCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.feeds.is_empty() {
            anyhow::bail!(
                "FEEDWATCH_FEEDS must contain at least one feed. \
                Set it via: export FEEDWATCH_FEEDS=source:name:url"
            );
        }

        match self.fetcher_type.as_str() {
            "http" => {}
            _ => anyhow::bail!(
                "FEEDWATCH_FETCHER_TYPE '{}' is not supported. \
                Supported types: http",
                self.fetcher_type
            ),
        }

        match self.state_store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "FEEDWATCH_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.state_store_type
            ),
        }

        if self.state_store_type == "file" {
            match self.state_store_dir.as_deref() {
                None | Some("") => anyhow::bail!(
                    "FEEDWATCH_STATE_STORE_DIR is required when FEEDWATCH_STATE_STORE_TYPE=file. \
                    Set it via: export FEEDWATCH_STATE_STORE_DIR=/var/lib/feedwatch"
                ),
                Some(_) => {}
            }
        }

        match self.sink_type.as_str() {
            "webhook" => {
                if self.sink_url.as_ref().is_none_or(|u| u.is_empty()) {
                    anyhow::bail!(
                        "FEEDWATCH_SINK_URL is required when FEEDWATCH_SINK_TYPE=webhook"
                    );
                }
            }
            "null" => {}
            _ => anyhow::bail!(
                "FEEDWATCH_SINK_TYPE '{}' is not supported. \
                Supported types: webhook, null",
                self.sink_type
            ),
        }

        if self.max_retries > 10 {
            anyhow::bail!(
                "FEEDWATCH_MAX_RETRIES must be between 0 and 10. Got: {}",
                self.max_retries
            );
        }

        if !(1..=300).contains(&self.retry_delay_secs) {
            anyhow::bail!(
                "FEEDWATCH_RETRY_DELAY_SECS must be between 1 and 300 seconds. Got: {}",
                self.retry_delay_secs
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "FEEDWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Assemble the core configuration from the environment view
    fn to_feedwatch_config(&self) -> FeedwatchConfig {
        let mut config = FeedwatchConfig::new();

        config.fetcher = FetcherConfig::Http {
            cache_dir: self.fetcher_cache_dir.clone(),
            timeout_secs: self.fetcher_timeout_secs,
        };

        config.state_store = match self.state_store_type.as_str() {
            "file" => StateStoreConfig::File {
                dir: self.state_store_dir.clone().unwrap_or_default(),
            },
            _ => StateStoreConfig::Memory,
        };

        config.sink = match self.sink_type.as_str() {
            "webhook" => SinkConfig::Webhook {
                url: self.sink_url.clone().unwrap_or_default(),
            },
            _ => SinkConfig::Null,
        };

        config.feeds = self
            .feeds
            .iter()
            .map(|(source, name, url)| FeedDescriptor::new(source, name, url))
            .collect();

        config.engine.environment = self.environment.clone();
        config.engine.max_retries = self.max_retries;
        config.engine.retry_delay_secs = self.retry_delay_secs;
        config.engine.archive_snapshots = self.archive_snapshots;

        config
    }
}

/// Parse one `source:name:url` feed triple
///
/// The URL itself contains colons, so only the first two separators split.
fn parse_feed_triple(spec: &str) -> Result<(String, String, String)> {
    let mut parts = spec.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(source), Some(name), Some(url))
            if !source.is_empty() && !name.is_empty() && !url.is_empty() =>
        {
            Ok((source.to_string(), name.to_string(), url.to_string()))
        }
        _ => anyhow::bail!(
            "Invalid feed spec '{}'. Expected source:name:url, e.g. \
            talosintelligence.com:ipreputation:https://example.com/feed.txt",
            spec
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return FeedwatchExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return FeedwatchExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return FeedwatchExitCode::ConfigError.into();
    }

    info!("Starting feedwatchd");
    info!("Configuration loaded: {} feed(s)", config.feeds.len());

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return FeedwatchExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_batch(config).await {
            Ok(()) => FeedwatchExitCode::Clean,
            Err(e) => {
                error!("Batch run error: {}", e);
                FeedwatchExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Run one batch of feed processing
async fn run_batch(config: Config) -> Result<()> {
    // Create the component registry and register everything available
    let registry = ComponentRegistry::new();
    register_builtin(&registry);

    #[cfg(feature = "http")]
    {
        info!("Registering HTTP feed fetcher");
        feedwatch_fetch_http::register(&registry);
    }

    #[cfg(feature = "webhook")]
    {
        info!("Registering webhook event sink");
        feedwatch_sink_webhook::register(&registry);
    }

    let core_config = config.to_feedwatch_config();

    let fetcher = registry.create_fetcher(&core_config.fetcher)?;
    let store =
        registry.create_state_store(&core_config.state_store, &core_config.engine.environment)?;
    let sink = registry.create_sink(&core_config.sink)?;

    info!(
        "Fetcher: {}, state store: {}, sink: {}",
        core_config.fetcher.type_name(),
        core_config.state_store.type_name(),
        core_config.sink.type_name()
    );
    for feed in &core_config.feeds {
        info!("Tracking feed: {}/{}", feed.source, feed.name);
    }

    let (engine, mut events) = FeedEngine::new(fetcher, store, sink, core_config)?;

    // Surface engine observability events in the daemon log
    let event_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::BatchStarted { feeds } => {
                    info!("Batch started: {} feed(s)", feeds);
                }
                EngineEvent::FeedSkipped { feed_name, reason } => {
                    info!("Feed {} skipped: {}", feed_name, reason);
                }
                EngineEvent::Bootstrapped { feed_name, records } => {
                    info!("Feed {} bootstrapped with {} record(s)", feed_name, records);
                }
                EngineEvent::SnapshotDelta { feed_name, net_new } => {
                    info!(
                        "Feed {} has {} net-new address(es) since last fetch",
                        feed_name,
                        net_new.len()
                    );
                }
                EngineEvent::RunCompleted {
                    feed_name,
                    entrants,
                    exits,
                } => {
                    info!(
                        "Feed {} completed: {} entrant(s), {} exit(s)",
                        feed_name, entrants, exits
                    );
                }
                EngineEvent::EmitFailed {
                    feed_name,
                    key,
                    error,
                } => {
                    error!("Feed {} failed to emit event for {}: {}", feed_name, key, error);
                }
                EngineEvent::BatchCompleted { feeds, failures } => {
                    info!("Batch completed: {} feed(s), {} failure(s)", feeds, failures);
                }
            }
        }
    });

    let summary = engine.run_batch().await;
    drop(engine);

    if let Err(e) = event_task.await {
        error!("Event logging task failed: {}", e);
    }

    info!(
        "Run finished: {} feed(s) processed, {} failure(s)",
        summary.runs.len(),
        summary.failures
    );

    Ok(())
}
