use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::EventPublisher;
use crate::error::{GatewayError, GatewayResult};
use crate::event::Event;
use crate::registry::ChannelResolver;

/// Header carrying the event type on every broker message.
pub const EVENT_TYPE_HEADER: &str = "event-type";

/// A message ready to hand to a broker.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Destination (topic, queue, ...).
    pub endpoint: String,
    /// JSON-encoded event.
    pub value: Vec<u8>,
    /// Message timestamp (the event's timestamp).
    pub timestamp: DateTime<Utc>,
    /// Message headers.
    pub headers: Vec<(String, Vec<u8>)>,
}

impl OutboundMessage {
    /// Builds the broker message for an event.
    pub fn from_event(endpoint: impl Into<String>, event: &Event) -> GatewayResult<Self> {
        let endpoint = endpoint.into();
        let value = serde_json::to_vec(event).map_err(|e| {
            GatewayError::publish(endpoint.clone(), format!("failed to encode event: {}", e))
        })?;

        Ok(Self {
            endpoint,
            value,
            timestamp: event.timestamp,
            headers: vec![(
                EVENT_TYPE_HEADER.to_string(),
                event.event_type.as_bytes().to_vec(),
            )],
        })
    }

    /// Gets a header value by name.
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_slice())
    }
}

/// A connection or writer bound to one destination.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Sends one message and waits for the broker's acknowledgment.
    async fn send(&self, message: &OutboundMessage) -> GatewayResult<()>;

    /// Flushes and releases the channel.
    async fn close(&self) -> GatewayResult<()> {
        Ok(())
    }
}

/// Opens delivery channels for destinations.
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    type Channel: DeliveryChannel + 'static;

    /// Opens a channel for `endpoint`.
    async fn open(&self, endpoint: &str) -> GatewayResult<Self::Channel>;
}

/// Configuration for [`BrokerPublisher`].
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Upper bound on waiting for a broker acknowledgment.
    pub delivery_timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: Duration::from_secs(5),
        }
    }
}

impl PublisherConfig {
    /// Creates a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delivery deadline.
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }
}

type ChannelSlot<C> = Arc<OnceCell<Arc<C>>>;

/// Broker-backed publisher.
///
/// Channels are created lazily, one per destination. Each destination has its
/// own slot; the map lock is held only to find the slot, and the open runs on
/// the slot, so concurrent first use opens exactly one channel without
/// stalling other destinations. Opening and sending share one deadline.
pub struct BrokerPublisher<F: ChannelFactory> {
    resolver: Arc<dyn ChannelResolver>,
    factory: F,
    channels: parking_lot::Mutex<HashMap<String, ChannelSlot<F::Channel>>>,
    config: PublisherConfig,
}

impl<F: ChannelFactory> BrokerPublisher<F> {
    /// Creates a publisher with the default configuration.
    pub fn new(resolver: Arc<dyn ChannelResolver>, factory: F) -> Self {
        Self::with_config(resolver, factory, PublisherConfig::default())
    }

    /// Creates a publisher with custom configuration.
    pub fn with_config(
        resolver: Arc<dyn ChannelResolver>,
        factory: F,
        config: PublisherConfig,
    ) -> Self {
        Self {
            resolver,
            factory,
            channels: parking_lot::Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Gets the channel factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Destinations with an open channel, sorted.
    pub fn cached_channels(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self
            .channels
            .lock()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(endpoint, _)| endpoint.clone())
            .collect();
        endpoints.sort();
        endpoints
    }

    async fn channel_for(&self, endpoint: &str) -> GatewayResult<Arc<F::Channel>> {
        let slot = self
            .channels
            .lock()
            .entry(endpoint.to_string())
            .or_default()
            .clone();

        // A failed or abandoned open leaves the slot empty for the next caller.
        let channel = slot
            .get_or_try_init(|| async {
                let channel = self.factory.open(endpoint).await?;
                tracing::info!(endpoint, "Created delivery channel");
                Ok::<_, GatewayError>(Arc::new(channel))
            })
            .await?;
        Ok(channel.clone())
    }

    /// Closes and drops every cached channel.
    ///
    /// Every channel is closed even if some fail; the first failure is returned.
    pub async fn close(&self) -> GatewayResult<()> {
        let drained: Vec<(String, ChannelSlot<F::Channel>)> =
            self.channels.lock().drain().collect();

        let mut first_error = None;
        for (endpoint, slot) in drained {
            let Some(channel) = slot.get() else {
                continue;
            };
            if let Err(e) = channel.close().await {
                tracing::error!(endpoint = %endpoint, error = %e, "Error closing delivery channel");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl<F: ChannelFactory> EventPublisher for BrokerPublisher<F> {
    async fn publish(&self, event: &Event) -> GatewayResult<()> {
        let (endpoint, _) = self.resolver.resolve_channel(&event.event_type)?;
        let message = OutboundMessage::from_event(endpoint.clone(), event)?;

        let timeout = self.config.delivery_timeout;
        let deliver = async {
            let channel = self.channel_for(&endpoint).await?;
            channel.send(&message).await
        };
        match tokio::time::timeout(timeout, deliver).await {
            Ok(Ok(())) => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    endpoint = %endpoint,
                    "Event published"
                );
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!(endpoint = %endpoint, error = %e, "Publish failed");
                Err(e)
            }
            Err(_) => {
                tracing::error!(endpoint = %endpoint, ?timeout, "Publish timed out");
                Err(GatewayError::PublishTimeout {
                    endpoint: endpoint.clone(),
                    timeout,
                })
            }
        }
    }
}
