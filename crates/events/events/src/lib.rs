//! # Event Gateway Events
//!
//! Schema-enforced event routing:
//! - Typed events selected by a declared type
//! - Hot-reloadable channel registry (type to destination and schema)
//! - JSON Schema validation with every violation reported
//! - Pluggable publishers (broker-backed, in-memory)
//! - An [`EventService`] that validates before it publishes
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use event_gateway_events::{Event, EventRegistry, EventService, JsonSchemaValidator, MemoryPublisher};
//!
//! let registry = Arc::new(EventRegistry::from_file("config/channels.json")?);
//! let validator = JsonSchemaValidator::from_dir("config/schema", registry.clone())?;
//! let publisher = MemoryPublisher::with_resolver(registry.clone());
//! let service = EventService::new(Arc::new(validator), Arc::new(publisher));
//!
//! let event = Event::from_json(
//!     "OrderStatusEvent",
//!     serde_json::json!({ "order_id": "12345", "status": "packed" }),
//! )?;
//! service.process_event(&event).await?;
//! ```

mod error;
mod event;
mod registry;
mod service;
pub mod publisher;
pub mod schema;

pub use error::{ErrorKind, GatewayError, GatewayResult};
pub use event::Event;
pub use registry::{
    ChannelInfo, ChannelResolver, ChannelSource, ChannelTable, EventRegistry, FileChannelSource,
    MemoryChannelSource,
};
pub use service::EventService;
pub use publisher::{
    BrokerPublisher, ChannelFactory, DeliveryChannel, EventPublisher, MemoryPublisher,
    OutboundMessage, PublishedEvent, PublisherConfig,
};
pub use schema::{EventValidator, JsonSchemaValidator, SchemaSet};

#[cfg(feature = "kafka")]
pub use publisher::{KafkaChannel, KafkaChannelFactory, KafkaConfig, KafkaTopicProvisioner};
