use serde::{Deserialize, Serialize};

use crate::{BookingId, FlightId, PaymentId};

/// Messages published on the seat event topic. The JSON shape is a stable
/// contract with observers: `{"type": "...", ...fields}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeatEvent {
    SeatHeld {
        flight_id: FlightId,
        seat: String,
        holder: String,
    },
    SeatConfirmed {
        flight_id: FlightId,
        seat: String,
        booking_id: BookingId,
    },
    PaymentSucceeded {
        booking_id: BookingId,
        payment_id: PaymentId,
    },
}

impl SeatEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SeatEvent::SeatHeld { .. } => "seat_held",
            SeatEvent::SeatConfirmed { .. } => "seat_confirmed",
            SeatEvent::PaymentSucceeded { .. } => "payment_succeeded",
        }
    }
}
