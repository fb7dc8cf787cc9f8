// # Webhook Event Sink
//
// This crate delivers change events downstream as HTTP POSTs, one request
// per event, with the event serialized as a JSON body.
//
// ## Delivery semantics
//
// Each `emit` is awaited and its response status checked; a non-2xx status
// or transport failure is an error. The engine decides what to do with a
// failed emission (log it and keep going), but the failure is always
// observable here rather than silently dropped.
//
// Events are emitted only after state has been durably saved, so a
// downstream consumer may see an event at most once per transition; a
// delivery failure means that transition's event is not re-sent.

use feedwatch_core::ComponentRegistry;
use feedwatch_core::config::SinkConfig;
use feedwatch_core::model::ChangeEvent;
use feedwatch_core::traits::{EventSink, EventSinkFactory};
use feedwatch_core::{Error, Result};

use std::time::Duration;

/// Request timeout for webhook deliveries
const DELIVERY_TIMEOUT_SECS: u64 = 30;

/// HTTP webhook sink
///
/// POSTs each change event as JSON to a fixed endpoint URL.
pub struct WebhookSink {
    /// Endpoint URL
    url: String,

    /// HTTP client (shared connection pool)
    client: reqwest::Client,
}

impl WebhookSink {
    /// Create a sink delivering to `url`
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed; a degraded client
    /// without the delivery timeout could block a feed run indefinitely.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::sink(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl EventSink for WebhookSink {
    async fn emit(&self, event: &ChangeEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| Error::sink(format!("POST {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::sink(format!(
                "Webhook returned HTTP {} for event {}",
                status, event.key
            )));
        }

        tracing::debug!("Delivered event for {} to {}", event.key, self.url);
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "webhook"
    }
}

/// Factory for creating webhook sinks
pub struct WebhookSinkFactory;

impl EventSinkFactory for WebhookSinkFactory {
    fn create(&self, config: &SinkConfig) -> Result<Box<dyn EventSink>> {
        match config {
            SinkConfig::Webhook { url } => Ok(Box::new(WebhookSink::new(url)?)),
            _ => Err(Error::config("Invalid config for webhook sink")),
        }
    }
}

/// Register the webhook sink with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_sink("webhook", Box::new(WebhookSinkFactory));
}
