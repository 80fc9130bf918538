use seatline_shared::{BookingId, NewPayment, Payment, PaymentStatus, SeatEvent};
use std::sync::Arc;
use tracing::{debug, info};

use crate::bus::EventPublisher;
use crate::store::{DurableStore, StoreError};

/// Matches the `payments.idempotency_key` column width.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Invalid payment request: {0}")]
    InvalidRequest(String),
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::Store(e) if e.is_retryable())
    }
}

/// Records payments exactly once per idempotency key.
///
/// Processing is simulated: every new payment is recorded as succeeded.
pub struct PaymentEngine {
    store: Arc<dyn DurableStore>,
    events: EventPublisher,
}

impl PaymentEngine {
    pub fn new(store: Arc<dyn DurableStore>, events: EventPublisher) -> Self {
        Self { store, events }
    }

    /// Record a payment, or return the one already recorded under
    /// `idempotency_key`. A replay never changes the stored amount and never
    /// publishes again.
    pub async fn pay(&self, booking_id: BookingId, amount_cents: i64, idempotency_key: &str) -> Result<Payment, PaymentError> {
        if idempotency_key.trim().is_empty() {
            return Err(PaymentError::InvalidRequest("idempotency key must not be empty".to_string()));
        }
        if idempotency_key.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(PaymentError::InvalidRequest(format!(
                "idempotency key must be at most {} bytes",
                MAX_IDEMPOTENCY_KEY_LEN
            )));
        }

        if let Some(existing) = self.store.find_payment_by_key(idempotency_key).await? {
            debug!("Idempotent replay for key {} -> payment {}", idempotency_key, existing.id);
            return Ok(existing);
        }

        // Replays skip amount validation
        if amount_cents < 0 {
            return Err(PaymentError::InvalidRequest("amount must not be negative".to_string()));
        }

        let inserted = self
            .store
            .insert_payment(NewPayment {
                booking_id,
                amount_cents,
                status: PaymentStatus::Succeeded,
                idempotency_key: idempotency_key.to_string(),
            })
            .await;

        match inserted {
            Ok(payment) => {
                info!("Payment {} recorded for booking {} ({} cents)", payment.id, booking_id, amount_cents);
                self.events
                    .publish_best_effort(&SeatEvent::PaymentSucceeded {
                        booking_id,
                        payment_id: payment.id,
                    })
                    .await;
                Ok(payment)
            }
            // A concurrent request with the same key won the insert
            Err(StoreError::UniqueViolation(_)) => {
                debug!("Lost insert race for key {}, returning winner", idempotency_key);
                self.store
                    .find_payment_by_key(idempotency_key)
                    .await?
                    .ok_or_else(|| {
                        PaymentError::Store(StoreError::Backend(format!(
                            "payment for key {} conflicted but cannot be read back",
                            idempotency_key
                        )))
                    })
            }
            Err(StoreError::ForeignKeyViolation(_)) => Err(PaymentError::BookingNotFound(booking_id)),
            Err(e) => Err(e.into()),
        }
    }
}
