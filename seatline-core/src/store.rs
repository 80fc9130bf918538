use async_trait::async_trait;
use seatline_shared::{Booking, FlightId, NewBooking, NewPayment, Payment, Seat, SeatId};

/// Failures surfaced by the durable store.
///
/// Constraint violations are kept apart from generic failures so the engines
/// can react to them (idempotent replay, missing booking). Lock contention is
/// kept apart from business conflicts so callers know a retry may succeed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),
    #[error("Lock contention (deadlock or lock timeout): {0}")]
    Contention(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Contention(_) | StoreError::Unavailable(_))
    }
}

/// Transactional access to flights, seats, bookings and payments.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Open a transaction used for seat confirmation.
    async fn begin(&self) -> Result<Box<dyn SeatTransaction>, StoreError>;

    async fn list_seats(&self, flight_id: FlightId) -> Result<Vec<Seat>, StoreError>;

    async fn find_payment_by_key(&self, idempotency_key: &str) -> Result<Option<Payment>, StoreError>;

    /// Insert and commit a payment. A duplicate idempotency key must come back
    /// as `StoreError::UniqueViolation`.
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError>;
}

/// An open durable transaction. Dropping it without `commit` rolls it back.
#[async_trait]
pub trait SeatTransaction: Send {
    /// Find the seat and hold an exclusive lock on it until the transaction ends.
    async fn lock_seat(&mut self, flight_id: FlightId, seat_code: &str) -> Result<Option<Seat>, StoreError>;

    async fn has_confirmed_booking(&mut self, seat_id: SeatId) -> Result<bool, StoreError>;

    async fn insert_booking(&mut self, booking: NewBooking) -> Result<Booking, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LockStoreError {
    #[error("Lock store unavailable: {0}")]
    Unavailable(String),
    #[error("Lock store command failed: {0}")]
    Command(String),
}

/// Fast expiring key-value store used for advisory seat holds.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomically set `key` only if it is absent. Returns whether the key was set.
    async fn set_if_absent(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool, LockStoreError>;

    /// Delete `key`. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), LockStoreError>;
}
