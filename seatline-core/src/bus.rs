use async_trait::async_trait;
use futures_util::stream::BoxStream;
use seatline_shared::SeatEvent;
use std::sync::Arc;
use tracing::{debug, warn};

/// Messages received from a subscription. Infinite until the backing
/// connection goes away; not restartable.
pub type MessageStream = BoxStream<'static, String>;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Event bus unavailable: {0}")]
    Unavailable(String),
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, topic: &str, message: &str) -> Result<(), BusError>;

    async fn subscribe(&self, topic: &str) -> Result<MessageStream, BusError>;
}

/// Typed front for the shared seat event topic.
#[derive(Clone)]
pub struct EventPublisher {
    bus: Arc<dyn EventBus>,
    topic: String,
}

impl EventPublisher {
    pub fn new(bus: Arc<dyn EventBus>, topic: impl Into<String>) -> Self {
        Self { bus, topic: topic.into() }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn publish(&self, event: &SeatEvent) -> Result<(), BusError> {
        let payload = serde_json::to_string(event)?;
        self.bus.publish(&self.topic, &payload).await?;
        debug!("Published {} to {}", event.kind(), self.topic);
        Ok(())
    }

    /// Publish, logging instead of returning a failure. Used after a commit,
    /// where the committed result must still be reported to the caller.
    pub async fn publish_best_effort(&self, event: &SeatEvent) {
        if let Err(e) = self.publish(event).await {
            warn!("Failed to publish {} to {}: {}", event.kind(), self.topic, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEventBus;
    use futures_util::StreamExt;

    struct DownBus;

    #[async_trait]
    impl EventBus for DownBus {
        async fn publish(&self, _topic: &str, _message: &str) -> Result<(), BusError> {
            Err(BusError::Unavailable("connection refused".into()))
        }

        async fn subscribe(&self, _topic: &str) -> Result<MessageStream, BusError> {
            Err(BusError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_publisher_writes_json_to_its_topic() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut stream = bus.subscribe("seat_events").await.unwrap();
        let publisher = EventPublisher::new(bus.clone(), "seat_events");
        assert_eq!(publisher.topic(), "seat_events");

        publisher
            .publish(&SeatEvent::PaymentSucceeded { booking_id: 1, payment_id: 2 })
            .await
            .unwrap();

        let raw = stream.next().await.unwrap();
        assert_eq!(raw, r#"{"type":"payment_succeeded","booking_id":1,"payment_id":2}"#);
    }

    #[tokio::test]
    async fn test_best_effort_publish_swallows_bus_failures() {
        let publisher = EventPublisher::new(Arc::new(DownBus), "seat_events");
        let event = SeatEvent::PaymentSucceeded { booking_id: 1, payment_id: 2 };

        assert!(publisher.publish(&event).await.is_err());
        publisher.publish_best_effort(&event).await;
    }
}
