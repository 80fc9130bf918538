use async_trait::async_trait;
use chrono::{DateTime, Utc};
use seatline_core::{DurableStore, SeatTransaction, StoreError};
use seatline_shared::{Booking, FlightId, NewBooking, NewPayment, Payment, Seat, SeatId};
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;

use crate::database::store_error;

/// PostgreSQL-backed durable store.
///
/// Confirmation transactions run at READ COMMITTED and lock the seat row
/// with `SELECT ... FOR UPDATE`. Each statement takes a fresh snapshot, so a
/// transaction that waited on the lock sees the booking committed by the
/// holder when it checks for one.
pub struct PgReservationStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgReservationStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: i64,
    flight_id: i64,
    seat_code: String,
    seat_class: String,
}

impl From<SeatRow> for Seat {
    fn from(row: SeatRow) -> Self {
        Seat {
            id: row.id,
            flight_id: row.flight_id,
            seat_code: row.seat_code,
            seat_class: row.seat_class,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i64,
    user_id: Option<i64>,
    flight_id: i64,
    seat_id: i64,
    status: String,
    hold_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            flight_id: row.flight_id,
            seat_id: row.seat_id,
            status: row.status.parse().map_err(StoreError::Backend)?,
            hold_expires_at: row.hold_expires_at,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: i64,
    booking_id: i64,
    amount_cents: i64,
    status: String,
    idempotency_key: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            booking_id: row.booking_id,
            amount_cents: row.amount_cents,
            status: row.status.parse().map_err(StoreError::Backend)?,
            idempotency_key: row.idempotency_key,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl DurableStore for PgReservationStore {
    async fn begin(&self) -> Result<Box<dyn SeatTransaction>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        // SET does not take bind parameters; the value is an integer we own.
        let set_timeout = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&set_timeout)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        Ok(Box::new(PgSeatTransaction { tx }))
    }

    async fn list_seats(&self, flight_id: FlightId) -> Result<Vec<Seat>, StoreError> {
        let rows = sqlx::query_as::<_, SeatRow>(
            "SELECT id, flight_id, seat_code, seat_class FROM seats WHERE flight_id = $1 ORDER BY id",
        )
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(Seat::from).collect())
    }

    async fn find_payment_by_key(&self, idempotency_key: &str) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, booking_id, amount_cents, status, idempotency_key, created_at
            FROM payments
            WHERE idempotency_key = $1
            "#,
        )
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(Payment::try_from).transpose()
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            INSERT INTO payments (booking_id, amount_cents, status, idempotency_key)
            VALUES ($1, $2, $3, $4)
            RETURNING id, booking_id, amount_cents, status, idempotency_key, created_at
            "#,
        )
        .bind(payment.booking_id)
        .bind(payment.amount_cents)
        .bind(payment.status.as_str())
        .bind(payment.idempotency_key)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        Payment::try_from(row)
    }
}

pub struct PgSeatTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SeatTransaction for PgSeatTransaction {
    async fn lock_seat(&mut self, flight_id: FlightId, seat_code: &str) -> Result<Option<Seat>, StoreError> {
        let row = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT id, flight_id, seat_code, seat_class
            FROM seats
            WHERE flight_id = $1 AND seat_code = $2
            FOR UPDATE
            "#,
        )
        .bind(flight_id)
        .bind(seat_code)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_error)?;

        Ok(row.map(Seat::from))
    }

    async fn has_confirmed_booking(&mut self, seat_id: SeatId) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM bookings WHERE seat_id = $1 AND status = 'confirmed')",
        )
        .bind(seat_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(store_error)
    }

    async fn insert_booking(&mut self, booking: NewBooking) -> Result<Booking, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            INSERT INTO bookings (user_id, flight_id, seat_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, flight_id, seat_id, status, hold_expires_at, created_at
            "#,
        )
        .bind(booking.user_id)
        .bind(booking.flight_id)
        .bind(booking.seat_id)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(store_error)?;

        Booking::try_from(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(store_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(store_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seatline_shared::{BookingStatus, PaymentStatus};

    #[test]
    fn test_booking_row_maps_status() {
        let row = BookingRow {
            id: 1,
            user_id: None,
            flight_id: 2,
            seat_id: 3,
            status: "confirmed".into(),
            hold_expires_at: None,
            created_at: Utc::now(),
        };
        let booking = Booking::try_from(row).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_unknown_payment_status_is_backend_error() {
        let row = PaymentRow {
            id: 1,
            booking_id: 2,
            amount_cents: 5000,
            status: "refunded".into(),
            idempotency_key: "key-1".into(),
            created_at: Utc::now(),
        };
        assert!(matches!(Payment::try_from(row), Err(StoreError::Backend(_))));

        let ok = PaymentRow {
            id: 1,
            booking_id: 2,
            amount_cents: 5000,
            status: "succeeded".into(),
            idempotency_key: "key-1".into(),
            created_at: Utc::now(),
        };
        assert_eq!(Payment::try_from(ok).unwrap().status, PaymentStatus::Succeeded);
    }
}
