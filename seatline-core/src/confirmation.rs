use chrono::Utc;
use seatline_shared::{Booking, BookingId, BookingStatus, FlightId, NewBooking, SeatEvent, UserId};
use std::sync::Arc;
use tracing::{info, warn};

use crate::bus::EventPublisher;
use crate::hold::HoldManager;
use crate::store::{DurableStore, SeatTransaction, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ConfirmError {
    #[error("seat not found: flight {flight_id} seat {seat_code}")]
    SeatNotFound { flight_id: FlightId, seat_code: String },
    #[error("seat already booked: flight {flight_id} seat {seat_code}")]
    SeatAlreadyBooked { flight_id: FlightId, seat_code: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ConfirmError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConfirmError::Store(e) if e.is_retryable())
    }
}

/// Numeric identities are stored; anything else books anonymously.
pub fn parse_user_id(user_id: &str) -> Option<UserId> {
    if user_id.is_empty() || !user_id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    user_id.parse().ok()
}

/// Turns a seat request into a durably confirmed booking.
///
/// The seat row lock taken inside the transaction is the only thing that
/// serializes confirmers of the same seat. Holds are neither required nor
/// checked: whoever reaches the lock first with the seat still free wins.
pub struct ConfirmationEngine {
    store: Arc<dyn DurableStore>,
    holds: Arc<HoldManager>,
    events: EventPublisher,
}

impl ConfirmationEngine {
    pub fn new(store: Arc<dyn DurableStore>, holds: Arc<HoldManager>, events: EventPublisher) -> Self {
        Self { store, holds, events }
    }

    pub async fn confirm(&self, flight_id: FlightId, seat_code: &str, user_id: &str) -> Result<BookingId, ConfirmError> {
        let mut tx = self.store.begin().await?;

        let booking = match book_locked_seat(tx.as_mut(), flight_id, seat_code, user_id).await {
            Ok(booking) => booking,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback failed for flight {} seat {}: {}", flight_id, seat_code, rollback_err);
                }
                return Err(e);
            }
        };

        tx.commit().await?;
        info!("Booking {} confirmed: flight {} seat {}", booking.id, flight_id, seat_code);

        // Committed. Nothing below may turn this into a failure.
        if let Err(e) = self.holds.release_hold(flight_id, seat_code).await {
            warn!("Failed to release hold for flight {} seat {}: {} (TTL will reclaim it)", flight_id, seat_code, e);
        }
        self.events
            .publish_best_effort(&SeatEvent::SeatConfirmed {
                flight_id,
                seat: seat_code.to_string(),
                booking_id: booking.id,
            })
            .await;

        Ok(booking.id)
    }
}

async fn book_locked_seat(
    tx: &mut dyn SeatTransaction,
    flight_id: FlightId,
    seat_code: &str,
    user_id: &str,
) -> Result<Booking, ConfirmError> {
    // 1. Lock the seat row; concurrent confirmers of this seat wait here
    let seat = tx
        .lock_seat(flight_id, seat_code)
        .await?
        .ok_or_else(|| ConfirmError::SeatNotFound {
            flight_id,
            seat_code: seat_code.to_string(),
        })?;

    // 2. Under the lock nobody can confirm this seat between check and insert
    if tx.has_confirmed_booking(seat.id).await? {
        return Err(ConfirmError::SeatAlreadyBooked {
            flight_id,
            seat_code: seat_code.to_string(),
        });
    }

    // 3. Insert the confirmed booking
    let booking = tx
        .insert_booking(NewBooking {
            user_id: parse_user_id(user_id),
            flight_id,
            seat_id: seat.id,
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        })
        .await?;

    Ok(booking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::memory::{InMemoryDurableStore, InMemoryEventBus, InMemoryLockStore};
    use crate::store::{LockStore, LockStoreError};
    use async_trait::async_trait;
    use futures_util::StreamExt;
    use seatline_shared::Seat;

    struct Fixture {
        engine: Arc<ConfirmationEngine>,
        holds: Arc<HoldManager>,
        store: InMemoryDurableStore,
        locks: Arc<InMemoryLockStore>,
        bus: Arc<InMemoryEventBus>,
        seat: Seat,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryDurableStore::new();
        let flight = store.add_flight("F100", "DEL", "AKL").await;
        let seat = store.add_seat(flight.id, "3B", "economy").await.unwrap();
        store.add_seat(flight.id, "3C", "economy").await.unwrap();

        let locks = Arc::new(InMemoryLockStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let events = EventPublisher::new(bus.clone(), "seat_events");
        let holds = Arc::new(HoldManager::new(locks.clone(), events.clone()));
        let engine = Arc::new(ConfirmationEngine::new(Arc::new(store.clone()), holds.clone(), events));

        Fixture { engine, holds, store, locks, bus, seat }
    }

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id("42"), Some(42));
        assert_eq!(parse_user_id("U1"), None);
        assert_eq!(parse_user_id("-5"), None);
        assert_eq!(parse_user_id(""), None);
        assert_eq!(parse_user_id("99999999999999999999999"), None);
    }

    #[tokio::test]
    async fn test_confirm_creates_single_confirmed_booking() {
        let f = fixture().await;

        let booking_id = f.engine.confirm(f.seat.flight_id, "3B", "17").await.unwrap();

        let bookings = f.store.confirmed_bookings(f.seat.id).await;
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].id, booking_id);
        assert_eq!(bookings[0].user_id, Some(17));
    }

    #[tokio::test]
    async fn test_unknown_seat_is_rejected_without_booking() {
        let f = fixture().await;

        let err = f.engine.confirm(f.seat.flight_id, "99Z", "U1").await.unwrap_err();

        assert!(matches!(err, ConfirmError::SeatNotFound { .. }));
        assert!(f.store.bookings().await.is_empty());
    }

    #[tokio::test]
    async fn test_second_confirm_is_rejected() {
        let f = fixture().await;

        f.engine.confirm(f.seat.flight_id, "3B", "U1").await.unwrap();
        let err = f.engine.confirm(f.seat.flight_id, "3B", "U2").await.unwrap_err();

        assert!(matches!(err, ConfirmError::SeatAlreadyBooked { .. }));
        assert!(!err.is_retryable());
        assert_eq!(f.store.bookings().await.len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_ignores_and_clears_foreign_hold() {
        let f = fixture().await;
        assert!(f.holds.try_hold(f.seat.flight_id, "3B", "U1", 300).await.unwrap());

        f.engine.confirm(f.seat.flight_id, "3B", "U2").await.unwrap();

        assert_eq!(f.locks.get(&crate::hold::hold_key(f.seat.flight_id, "3B")).await, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_confirms_have_exactly_one_winner() {
        let f = fixture().await;

        let mut tasks = Vec::new();
        for i in 0..16 {
            let engine = f.engine.clone();
            let flight_id = f.seat.flight_id;
            tasks.push(tokio::spawn(async move { engine.confirm(flight_id, "3B", &i.to_string()).await }));
        }

        let mut won = 0;
        let mut lost = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => won += 1,
                Err(ConfirmError::SeatAlreadyBooked { .. }) => lost += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(won, 1);
        assert_eq!(lost, 15);
        assert_eq!(f.store.confirmed_bookings(f.seat.id).await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_different_seats_confirm_independently() {
        let f = fixture().await;
        let flight_id = f.seat.flight_id;

        let (a, b) = tokio::join!(f.engine.confirm(flight_id, "3B", "U1"), f.engine.confirm(flight_id, "3C", "U2"));

        assert!(a.is_ok());
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_confirm_publishes_after_commit() {
        let f = fixture().await;
        let mut stream = f.bus.subscribe("seat_events").await.unwrap();

        let booking_id = f.engine.confirm(f.seat.flight_id, "3B", "U1").await.unwrap();

        let event: SeatEvent = serde_json::from_str(&stream.next().await.unwrap()).unwrap();
        assert_eq!(
            event,
            SeatEvent::SeatConfirmed { flight_id: f.seat.flight_id, seat: "3B".into(), booking_id }
        );
    }

    struct BrokenLocks;

    #[async_trait]
    impl LockStore for BrokenLocks {
        async fn set_if_absent(&self, _key: &str, _value: &str, _ttl: u64) -> Result<bool, LockStoreError> {
            Err(LockStoreError::Unavailable("connection reset".into()))
        }

        async fn delete(&self, _key: &str) -> Result<(), LockStoreError> {
            Err(LockStoreError::Unavailable("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn test_failed_hold_release_does_not_fail_confirm() {
        let f = fixture().await;
        let events = EventPublisher::new(f.bus.clone(), "seat_events");
        let holds = Arc::new(HoldManager::new(Arc::new(BrokenLocks), events.clone()));
        let engine = ConfirmationEngine::new(Arc::new(f.store.clone()), holds, events);

        assert!(engine.confirm(f.seat.flight_id, "3B", "U1").await.is_ok());
        assert_eq!(f.store.confirmed_bookings(f.seat.id).await.len(), 1);
    }
}
