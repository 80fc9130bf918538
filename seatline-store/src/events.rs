use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use seatline_core::{BusError, EventBus, MessageStream};
use tracing::{debug, warn};

/// Event bus over Redis pub/sub.
///
/// A channel is a single ordered stream per publisher connection, and Redis
/// keeps no history, so late subscribers only see later messages.
#[derive(Clone)]
pub struct RedisEventBus {
    client: redis::Client,
}

impl RedisEventBus {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

fn bus_error(err: redis::RedisError) -> BusError {
    BusError::Unavailable(err.to_string())
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, topic: &str, message: &str) -> Result<(), BusError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(bus_error)?;
        let receivers: i64 = conn.publish(topic, message).await.map_err(bus_error)?;
        debug!("Published to {} ({} receivers)", topic, receivers);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<MessageStream, BusError> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(bus_error)?;
        pubsub.subscribe(topic).await.map_err(bus_error)?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            match msg.get_payload::<String>() {
                Ok(payload) => Some(payload),
                Err(e) => {
                    warn!("Skipping undecodable message on {}: {}", msg.get_channel_name(), e);
                    None
                }
            }
        });
        Ok(stream.boxed())
    }
}
