//! Publishers - delivery of validated events to broker destinations
//!
//! - [`EventPublisher`]: the single-method capability the service depends on
//! - [`MemoryPublisher`]: records events in memory, for tests and development
//! - [`BrokerPublisher`]: resolves the destination, caches one delivery
//!   channel per destination and bounds every send with a deadline
//! - Kafka channels and topic provisioning behind the `kafka` feature

mod broker;
mod memory;
#[cfg(feature = "kafka")]
mod kafka;

use async_trait::async_trait;

use crate::error::GatewayResult;
use crate::event::Event;

pub use broker::{BrokerPublisher, ChannelFactory, DeliveryChannel, OutboundMessage, PublisherConfig};
pub use memory::{MemoryPublisher, PublishedEvent};

#[cfg(feature = "kafka")]
pub use kafka::{KafkaChannel, KafkaChannelFactory, KafkaConfig, KafkaTopicProvisioner};

/// Sends a validated event to its resolved destination.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes the event, or fails with a publish-class error.
    async fn publish(&self, event: &Event) -> GatewayResult<()>;
}
