use async_trait::async_trait;
use redis::AsyncCommands;
use seatline_core::{LockStore, LockStoreError};
use tracing::debug;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &redis::Client {
        &self.client
    }
}

pub(crate) fn lock_store_error(err: redis::RedisError) -> LockStoreError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_timeout() {
        LockStoreError::Unavailable(err.to_string())
    } else {
        LockStoreError::Command(err.to_string())
    }
}

#[async_trait]
impl LockStore for RedisClient {
    async fn set_if_absent(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool, LockStoreError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(lock_store_error)?;

        // SET NX EX: only set if key does not exist, with expiry
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(lock_store_error)?;

        Ok(result.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), LockStoreError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(lock_store_error)?;
        let removed: i64 = conn.del(key).await.map_err(lock_store_error)?;
        debug!("DEL {} removed {} key(s)", key, removed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        // Nothing listens on port 1
        let redis = RedisClient::new("redis://127.0.0.1:1/").await.unwrap();
        let err = redis.set_if_absent("hold:1:1A", "42", 30).await.unwrap_err();
        assert!(matches!(err, LockStoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_malformed_url_is_rejected() {
        assert!(RedisClient::new("not-a-redis-url").await.is_err());
    }
}
