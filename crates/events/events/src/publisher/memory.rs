use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::EventPublisher;
use crate::error::GatewayResult;
use crate::event::Event;
use crate::registry::ChannelResolver;

/// An event captured by [`MemoryPublisher`].
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    /// The event as passed to `publish`.
    pub event: Event,
    /// Destination the event would have been sent to, if a resolver was
    /// configured and the type was still registered.
    pub endpoint: Option<String>,
}

/// In-memory implementation of EventPublisher
///
/// Records every published event and always succeeds. Useful for testing
/// and development. Data is lost when the process exits.
#[derive(Clone, Default)]
pub struct MemoryPublisher {
    published: Arc<RwLock<Vec<PublishedEvent>>>,
    resolver: Option<Arc<dyn ChannelResolver>>,
}

impl MemoryPublisher {
    /// Creates a publisher that records events without destinations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also records the resolved destination of each event.
    pub fn with_resolver(resolver: Arc<dyn ChannelResolver>) -> Self {
        Self {
            published: Arc::new(RwLock::new(Vec::new())),
            resolver: Some(resolver),
        }
    }

    /// Returns everything published so far, in call order.
    pub async fn published(&self) -> Vec<PublishedEvent> {
        self.published.read().await.clone()
    }

    /// Returns the number of publish calls.
    pub async fn count(&self) -> usize {
        self.published.read().await.len()
    }

    /// Forgets all recorded events.
    pub async fn clear(&self) {
        self.published.write().await.clear();
    }
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(&self, event: &Event) -> GatewayResult<()> {
        let endpoint = self
            .resolver
            .as_ref()
            .and_then(|r| r.resolve_channel(&event.event_type).ok())
            .map(|(endpoint, _)| endpoint);

        self.published.write().await.push(PublishedEvent {
            event: event.clone(),
            endpoint,
        });
        Ok(())
    }
}
