// # Event Sink Trait
//
// Defines the interface for delivering change events downstream.
//
// ## Implementations
//
// - HTTP webhook: `feedwatch-sink-webhook` crate
// - Test doubles: counting sinks in the contract tests
//
// ## Delivery contract
//
// The engine calls `emit` once per entrant, only after the feed's state
// has been durably persisted. Delivery is at-most-once best-effort: a
// failed emit is logged and reported, the state is not rolled back, and
// the run continues with the remaining entrants. Downstream idempotence
// is the consumer's responsibility.
//
// Sinks must not spawn detached tasks; the engine awaits every emit so
// failures stay observable.

use async_trait::async_trait;

use crate::model::ChangeEvent;

/// Trait for change-event sink implementations
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one change event
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The event was accepted downstream
    /// - `Err(Error)`: Delivery failed; the engine logs and moves on
    async fn emit(&self, event: &ChangeEvent) -> Result<(), crate::Error>;

    /// Get the sink name (for logging/debugging)
    fn sink_name(&self) -> &'static str;
}

/// Helper trait for constructing sinks from configuration
pub trait EventSinkFactory: Send + Sync {
    /// Create an EventSink instance from configuration
    fn create(&self, config: &crate::config::SinkConfig)
    -> Result<Box<dyn EventSink>, crate::Error>;
}

/// Sink that logs entrants and delivers nothing
///
/// Useful for dry runs and for deployments that only want durable state
/// without downstream notification.
#[derive(Debug, Clone, Default)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn emit(&self, event: &ChangeEvent) -> Result<(), crate::Error> {
        tracing::info!("entrant {} for {}/{}", event.key, event.source, event.feed_name);
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "null"
    }
}

/// Factory for the null sink
pub struct NullSinkFactory;

impl EventSinkFactory for NullSinkFactory {
    fn create(
        &self,
        config: &crate::config::SinkConfig,
    ) -> Result<Box<dyn EventSink>, crate::Error> {
        match config {
            crate::config::SinkConfig::Null => Ok(Box::new(NullSink)),
            _ => Err(crate::Error::config("Invalid config for null sink")),
        }
    }
}
