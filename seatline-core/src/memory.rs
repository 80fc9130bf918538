//! In-process implementations of the store and bus traits.
//!
//! They keep the same concurrency discipline as the real backends: a seat
//! lock taken inside a transaction is held until commit or rollback, hold
//! keys expire on their own, and the bus keeps no history for late
//! subscribers.

use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use seatline_shared::{
    Booking, BookingId, BookingStatus, Flight, FlightId, NewBooking, NewPayment, Payment, Seat, SeatId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};
use tokio::time::{Duration, Instant};
use tokio_stream::wrappers::BroadcastStream;

use crate::bus::{BusError, EventBus, MessageStream};
use crate::store::{DurableStore, LockStore, LockStoreError, SeatTransaction, StoreError};

#[derive(Default)]
struct MemoryState {
    flights: HashMap<FlightId, Flight>,
    seats: HashMap<SeatId, Seat>,
    bookings: Vec<Booking>,
    payments: Vec<Payment>,
    last_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn find_seat(&self, flight_id: FlightId, seat_code: &str) -> Option<&Seat> {
        self.seats
            .values()
            .find(|s| s.flight_id == flight_id && s.seat_code == seat_code)
    }

    fn seat_is_confirmed(&self, seat_id: SeatId) -> bool {
        self.bookings
            .iter()
            .any(|b| b.seat_id == seat_id && b.status == BookingStatus::Confirmed)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryDurableStore {
    state: Arc<Mutex<MemoryState>>,
    seat_locks: Arc<Mutex<HashMap<SeatId, Arc<Mutex<()>>>>>,
}

impl InMemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_flight(&self, flight_number: &str, origin: &str, destination: &str) -> Flight {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let flight = Flight {
            id: state.next_id(),
            flight_number: flight_number.to_string(),
            origin: origin.to_string(),
            destination: destination.to_string(),
            depart_at: now + chrono::Duration::days(1),
            arrive_at: now + chrono::Duration::days(1) + chrono::Duration::hours(12),
            status: "scheduled".to_string(),
        };
        state.flights.insert(flight.id, flight.clone());
        flight
    }

    pub async fn add_seat(&self, flight_id: FlightId, seat_code: &str, seat_class: &str) -> Result<Seat, StoreError> {
        let mut state = self.state.lock().await;
        if !state.flights.contains_key(&flight_id) {
            return Err(StoreError::ForeignKeyViolation(format!("flight {} does not exist", flight_id)));
        }
        if state.find_seat(flight_id, seat_code).is_some() {
            return Err(StoreError::UniqueViolation(format!("seat {} already exists on flight {}", seat_code, flight_id)));
        }
        let seat = Seat {
            id: state.next_id(),
            flight_id,
            seat_code: seat_code.to_string(),
            seat_class: seat_class.to_string(),
        };
        state.seats.insert(seat.id, seat.clone());
        Ok(seat)
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.state.lock().await.bookings.clone()
    }

    pub async fn confirmed_bookings(&self, seat_id: SeatId) -> Vec<Booking> {
        self.state
            .lock()
            .await
            .bookings
            .iter()
            .filter(|b| b.seat_id == seat_id && b.status == BookingStatus::Confirmed)
            .cloned()
            .collect()
    }

    pub async fn payments(&self) -> Vec<Payment> {
        self.state.lock().await.payments.clone()
    }

    async fn seat_lock(&self, seat_id: SeatId) -> Arc<Mutex<()>> {
        let mut locks = self.seat_locks.lock().await;
        locks.entry(seat_id).or_default().clone()
    }
}

#[async_trait]
impl DurableStore for InMemoryDurableStore {
    async fn begin(&self) -> Result<Box<dyn SeatTransaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            guards: Vec::new(),
            pending: Vec::new(),
        }))
    }

    async fn list_seats(&self, flight_id: FlightId) -> Result<Vec<Seat>, StoreError> {
        let state = self.state.lock().await;
        let mut seats: Vec<Seat> = state
            .seats
            .values()
            .filter(|s| s.flight_id == flight_id)
            .cloned()
            .collect();
        seats.sort_by_key(|s| s.id);
        Ok(seats)
    }

    async fn find_payment_by_key(&self, idempotency_key: &str) -> Result<Option<Payment>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .iter()
            .find(|p| p.idempotency_key == idempotency_key)
            .cloned())
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let mut state = self.state.lock().await;
        if !state.bookings.iter().any(|b| b.id == payment.booking_id) {
            return Err(StoreError::ForeignKeyViolation(format!("booking {} does not exist", payment.booking_id)));
        }
        if state.payments.iter().any(|p| p.idempotency_key == payment.idempotency_key) {
            return Err(StoreError::UniqueViolation(format!(
                "idempotency key {} already used",
                payment.idempotency_key
            )));
        }
        let row = Payment {
            id: state.next_id(),
            booking_id: payment.booking_id,
            amount_cents: payment.amount_cents,
            status: payment.status,
            idempotency_key: payment.idempotency_key,
            created_at: Utc::now(),
        };
        state.payments.push(row.clone());
        Ok(row)
    }
}

struct MemoryTransaction {
    store: InMemoryDurableStore,
    guards: Vec<OwnedMutexGuard<()>>,
    pending: Vec<Booking>,
}

#[async_trait]
impl SeatTransaction for MemoryTransaction {
    async fn lock_seat(&mut self, flight_id: FlightId, seat_code: &str) -> Result<Option<Seat>, StoreError> {
        let seat = {
            let state = self.store.state.lock().await;
            state.find_seat(flight_id, seat_code).cloned()
        };
        let Some(seat) = seat else {
            return Ok(None);
        };

        let lock = self.store.seat_lock(seat.id).await;
        self.guards.push(lock.lock_owned().await);
        Ok(Some(seat))
    }

    async fn has_confirmed_booking(&mut self, seat_id: SeatId) -> Result<bool, StoreError> {
        let committed = self.store.state.lock().await.seat_is_confirmed(seat_id);
        let pending = self
            .pending
            .iter()
            .any(|b| b.seat_id == seat_id && b.status == BookingStatus::Confirmed);
        Ok(committed || pending)
    }

    async fn insert_booking(&mut self, booking: NewBooking) -> Result<Booking, StoreError> {
        // Ids come from a shared sequence and are not reused after rollback.
        let id: BookingId = self.store.state.lock().await.next_id();
        let row = Booking {
            id,
            user_id: booking.user_id,
            flight_id: booking.flight_id,
            seat_id: booking.seat_id,
            status: booking.status,
            hold_expires_at: None,
            created_at: booking.created_at,
        };
        self.pending.push(row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut state = self.store.state.lock().await;
        for booking in &self.pending {
            if booking.status == BookingStatus::Confirmed && state.seat_is_confirmed(booking.seat_id) {
                return Err(StoreError::UniqueViolation(format!(
                    "seat {} already has a confirmed booking",
                    booking.seat_id
                )));
            }
        }
        state.bookings.extend(self.pending.iter().cloned());
        // Seat guards are released when `self` drops, after the bookings are visible.
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Expiring key-value store. Expiry uses tokio's clock so paused-time tests
/// can advance it.
#[derive(Default)]
pub struct InMemoryLockStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a live key.
    pub async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone())
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool, LockStoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if let Some((_, expires_at)) = entries.get(key) {
            if *expires_at > now {
                return Ok(false);
            }
        }
        entries.insert(key.to_string(), (value.to_string(), now + Duration::from_secs(ttl_seconds)));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), LockStoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

const DEFAULT_TOPIC_CAPACITY: usize = 1024;

/// Topic fan-out over tokio broadcast channels. Messages published while a
/// topic has no subscribers are dropped.
pub struct InMemoryEventBus {
    topics: Mutex<HashMap<String, broadcast::Sender<String>>>,
    capacity: usize,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    async fn sender(&self, topic: &str) -> broadcast::Sender<String> {
        let mut topics = self.topics.lock().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, message: &str) -> Result<(), BusError> {
        // A send error only means nobody is listening right now.
        let _ = self.sender(topic).await.send(message.to_string());
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<MessageStream, BusError> {
        let rx = self.sender(topic).await.subscribe();
        // Lagged receivers skip what they missed.
        let stream = BroadcastStream::new(rx).filter_map(|item| futures_util::future::ready(item.ok()));
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seatline_shared::PaymentStatus;

    async fn store_with_seat() -> (InMemoryDurableStore, Seat) {
        let store = InMemoryDurableStore::new();
        let flight = store.add_flight("F100", "DEL", "AKL").await;
        let seat = store.add_seat(flight.id, "3B", "economy").await.unwrap();
        (store, seat)
    }

    fn confirmed(seat: &Seat) -> NewBooking {
        NewBooking {
            user_id: None,
            flight_id: seat.flight_id,
            seat_id: seat.id,
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_seat_code_is_rejected() {
        let (store, seat) = store_with_seat().await;
        let err = store.add_seat(seat.flight_id, "3B", "business").await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_rolled_back_booking_is_never_visible() {
        let (store, seat) = store_with_seat().await;

        let mut tx = store.begin().await.unwrap();
        tx.lock_seat(seat.flight_id, "3B").await.unwrap().unwrap();
        tx.insert_booking(confirmed(&seat)).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(store.bookings().await.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_transaction_releases_seat_lock() {
        let (store, seat) = store_with_seat().await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.lock_seat(seat.flight_id, "3B").await.unwrap().unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        let locked = tokio::time::timeout(Duration::from_secs(1), tx.lock_seat(seat.flight_id, "3B")).await;
        assert!(locked.is_ok(), "seat lock leaked past a dropped transaction");
    }

    #[tokio::test]
    async fn test_seat_lock_blocks_second_transaction_until_commit() {
        let (store, seat) = store_with_seat().await;

        let mut first = store.begin().await.unwrap();
        first.lock_seat(seat.flight_id, "3B").await.unwrap().unwrap();

        let contender = store.clone();
        let flight_id = seat.flight_id;
        let waiter = tokio::spawn(async move {
            let mut second = contender.begin().await.unwrap();
            let seat = second.lock_seat(flight_id, "3B").await.unwrap().unwrap();
            second.has_confirmed_booking(seat.id).await.unwrap()
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        first.insert_booking(confirmed(&seat)).await.unwrap();
        first.commit().await.unwrap();

        assert!(waiter.await.unwrap(), "second transaction must see the committed booking");
    }

    #[tokio::test]
    async fn test_payment_requires_existing_booking() {
        let store = InMemoryDurableStore::new();
        let err = store
            .insert_payment(NewPayment {
                booking_id: 99,
                amount_cents: 100,
                status: PaymentStatus::Succeeded,
                idempotency_key: "k".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_store_key_expires() {
        let locks = InMemoryLockStore::new();
        assert!(locks.set_if_absent("hold:1:3B", "U1", 1).await.unwrap());
        assert!(!locks.set_if_absent("hold:1:3B", "U2", 1).await.unwrap());

        tokio::time::advance(Duration::from_millis(1500)).await;

        assert_eq!(locks.get("hold:1:3B").await, None);
        assert!(locks.set_if_absent("hold:1:3B", "U2", 1).await.unwrap());
        assert_eq!(locks.get("hold:1:3B").await.as_deref(), Some("U2"));
    }

    #[tokio::test]
    async fn test_bus_does_not_replay_to_late_subscribers() {
        let bus = InMemoryEventBus::new();
        bus.publish("seat_events", "early").await.unwrap();

        let mut stream = bus.subscribe("seat_events").await.unwrap();
        bus.publish("seat_events", "late").await.unwrap();

        assert_eq!(stream.next().await.as_deref(), Some("late"));
    }
}
