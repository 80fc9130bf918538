use seatline_shared::{FlightId, SeatEvent};
use std::sync::Arc;
use tracing::{debug, info};

use crate::bus::EventPublisher;
use crate::store::{LockStore, LockStoreError};

pub const DEFAULT_HOLD_TTL_SECONDS: u64 = 300;

pub fn hold_key(flight_id: FlightId, seat_code: &str) -> String {
    format!("hold:{}:{}", flight_id, seat_code)
}

#[derive(Debug, thiserror::Error)]
pub enum HoldError {
    #[error("Invalid hold request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Store(#[from] LockStoreError),
}

/// Grants short-lived advisory holds on seats.
///
/// Holds live only in the lock store and are never consulted when a seat is
/// confirmed. They exist to reduce contention and drive UI feedback.
pub struct HoldManager {
    locks: Arc<dyn LockStore>,
    events: EventPublisher,
    default_ttl_seconds: u64,
}

impl HoldManager {
    pub fn new(locks: Arc<dyn LockStore>, events: EventPublisher) -> Self {
        Self {
            locks,
            events,
            default_ttl_seconds: DEFAULT_HOLD_TTL_SECONDS,
        }
    }

    pub fn with_default_ttl(mut self, ttl_seconds: u64) -> Self {
        self.default_ttl_seconds = ttl_seconds;
        self
    }

    pub fn default_ttl_seconds(&self) -> u64 {
        self.default_ttl_seconds
    }

    /// Try to hold a seat for `ttl_seconds`. `Ok(false)` means someone else
    /// holds it, which is an expected outcome.
    pub async fn try_hold(
        &self,
        flight_id: FlightId,
        seat_code: &str,
        holder_id: &str,
        ttl_seconds: u64,
    ) -> Result<bool, HoldError> {
        if ttl_seconds == 0 {
            return Err(HoldError::InvalidRequest("ttl must be positive".to_string()));
        }
        if holder_id.is_empty() {
            return Err(HoldError::InvalidRequest("holder id must not be empty".to_string()));
        }
        if seat_code.is_empty() {
            return Err(HoldError::InvalidRequest("seat code must not be empty".to_string()));
        }

        let key = hold_key(flight_id, seat_code);
        let granted = self.locks.set_if_absent(&key, holder_id, ttl_seconds).await?;
        if !granted {
            debug!("Hold denied for {} (already held)", key);
            return Ok(false);
        }

        info!("Seat hold granted: {} -> {} for {}s", key, holder_id, ttl_seconds);
        self.events
            .publish_best_effort(&SeatEvent::SeatHeld {
                flight_id,
                seat: seat_code.to_string(),
                holder: holder_id.to_string(),
            })
            .await;
        Ok(true)
    }

    pub async fn try_hold_default(&self, flight_id: FlightId, seat_code: &str, holder_id: &str) -> Result<bool, HoldError> {
        self.try_hold(flight_id, seat_code, holder_id, self.default_ttl_seconds).await
    }

    /// Drop any hold on the seat. Releasing an absent hold succeeds.
    pub async fn release_hold(&self, flight_id: FlightId, seat_code: &str) -> Result<(), HoldError> {
        let key = hold_key(flight_id, seat_code);
        self.locks.delete(&key).await?;
        debug!("Seat hold released: {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::memory::{InMemoryEventBus, InMemoryLockStore};
    use futures_util::StreamExt;
    use tokio::time::Duration;

    fn manager() -> (HoldManager, Arc<InMemoryLockStore>, Arc<InMemoryEventBus>) {
        let locks = Arc::new(InMemoryLockStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let events = EventPublisher::new(bus.clone(), "seat_events");
        (HoldManager::new(locks.clone(), events), locks, bus)
    }

    #[test]
    fn test_hold_key_format() {
        assert_eq!(hold_key(100, "3B"), "hold:100:3B");
    }

    #[tokio::test]
    async fn test_second_holder_is_denied() {
        let (holds, locks, _) = manager();

        assert!(holds.try_hold(1, "3B", "U1", 300).await.unwrap());
        assert!(!holds.try_hold(1, "3B", "U2", 300).await.unwrap());
        assert_eq!(locks.get("hold:1:3B").await.as_deref(), Some("U1"));
    }

    #[tokio::test]
    async fn test_rejects_zero_ttl_and_empty_holder() {
        let (holds, locks, _) = manager();

        assert!(matches!(holds.try_hold(1, "3B", "U1", 0).await, Err(HoldError::InvalidRequest(_))));
        assert!(matches!(holds.try_hold(1, "3B", "", 300).await, Err(HoldError::InvalidRequest(_))));
        assert_eq!(locks.get("hold:1:3B").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_expires_after_ttl() {
        let (holds, locks, _) = manager();

        assert!(holds.try_hold(1, "3B", "U1", 1).await.unwrap());
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(locks.get("hold:1:3B").await, None);
        assert!(holds.try_hold(1, "3B", "U2", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (holds, _, _) = manager();

        holds.try_hold(1, "3B", "U1", 300).await.unwrap();
        holds.release_hold(1, "3B").await.unwrap();
        holds.release_hold(1, "3B").await.unwrap();
        assert!(holds.try_hold(1, "3B", "U2", 300).await.unwrap());
    }

    #[tokio::test]
    async fn test_only_granted_holds_publish() {
        let (holds, _, bus) = manager();
        let mut stream = bus.subscribe("seat_events").await.unwrap();

        holds.try_hold(7, "1A", "U1", 300).await.unwrap();
        holds.try_hold(7, "1A", "U2", 300).await.unwrap();
        holds.try_hold(7, "1B", "U2", 300).await.unwrap();

        let first: SeatEvent = serde_json::from_str(&stream.next().await.unwrap()).unwrap();
        let second: SeatEvent = serde_json::from_str(&stream.next().await.unwrap()).unwrap();
        assert_eq!(
            first,
            SeatEvent::SeatHeld { flight_id: 7, seat: "1A".into(), holder: "U1".into() }
        );
        assert_eq!(
            second,
            SeatEvent::SeatHeld { flight_id: 7, seat: "1B".into(), holder: "U2".into() }
        );
    }

    #[tokio::test]
    async fn test_default_ttl_is_configurable() {
        let (holds, _, _) = manager();
        assert_eq!(holds.default_ttl_seconds(), 300);

        let holds = holds.with_default_ttl(60);
        assert_eq!(holds.default_ttl_seconds(), 60);
        assert!(holds.try_hold_default(1, "2C", "U1").await.unwrap());
    }
}
