//! The validate-then-publish pipeline.

use std::sync::Arc;

use crate::error::GatewayResult;
use crate::event::Event;
use crate::publisher::EventPublisher;
use crate::schema::EventValidator;

/// Sequences validation and publication.
///
/// A failed validation returns before the publisher is touched. A failed
/// publish is reported as-is; nothing is buffered or retried.
#[derive(Clone)]
pub struct EventService {
    validator: Arc<dyn EventValidator>,
    publisher: Arc<dyn EventPublisher>,
}

impl EventService {
    /// Creates a new service over shared collaborators.
    pub fn new(validator: Arc<dyn EventValidator>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            validator,
            publisher,
        }
    }

    /// Validates the event and, only if it is valid, publishes it.
    pub async fn process_event(&self, event: &Event) -> GatewayResult<()> {
        let result = match self.validator.validate(event) {
            Ok(()) => self.publisher.publish(event).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => {
                tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Event processed");
            }
            Err(e) if e.is_client_error() => {
                tracing::warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    kind = %e.kind(),
                    error = %e,
                    "Event rejected"
                );
            }
            Err(e) => {
                tracing::error!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    kind = %e.kind(),
                    error = %e,
                    "Event processing failed"
                );
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, GatewayError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedValidator(Option<ErrorKind>);

    impl EventValidator for FixedValidator {
        fn validate(&self, event: &Event) -> GatewayResult<()> {
            match self.0 {
                None => Ok(()),
                Some(ErrorKind::ChannelNotFound) => {
                    Err(GatewayError::channel_not_found(&event.event_type))
                }
                Some(_) => Err(GatewayError::Validation {
                    event_type: event.event_type.clone(),
                    reasons: vec!["(root): nope".into()],
                }),
            }
        }
    }

    #[derive(Default)]
    struct CountingPublisher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EventPublisher for CountingPublisher {
        async fn publish(&self, _event: &Event) -> GatewayResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(GatewayError::publish("order-topic", "broker unreachable"))
            } else {
                Ok(())
            }
        }
    }

    fn event() -> Event {
        Event::new("OrderStatusEvent", Default::default())
    }

    #[tokio::test]
    async fn test_valid_event_is_published_once() {
        let publisher = Arc::new(CountingPublisher::default());
        let service = EventService::new(Arc::new(FixedValidator(None)), publisher.clone());

        service.process_event(&event()).await.unwrap();

        assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_event_never_reaches_publisher() {
        for kind in [ErrorKind::Validation, ErrorKind::ChannelNotFound] {
            let publisher = Arc::new(CountingPublisher::default());
            let service =
                EventService::new(Arc::new(FixedValidator(Some(kind))), publisher.clone());

            let err = service.process_event(&event()).await.unwrap_err();

            assert_eq!(err.kind(), kind);
            assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_publish_error_returned_verbatim() {
        let publisher = Arc::new(CountingPublisher {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let service = EventService::new(Arc::new(FixedValidator(None)), publisher.clone());

        let err = service.process_event(&event()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Publish);
        assert_eq!(err.to_string(), "Failed to publish to 'order-topic': broker unreachable");
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
    }
}
