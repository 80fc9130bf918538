use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{BookingId, FlightId, SeatId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: FlightId,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub depart_at: DateTime<Utc>,
    pub arrive_at: DateTime<Utc>,
    pub status: String,
}

/// A physical seat on one flight. `(flight_id, seat_code)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub flight_id: FlightId,
    pub seat_code: String,
    pub seat_class: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Hold,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Hold => "hold",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hold" => Ok(BookingStatus::Hold),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: Option<UserId>,
    pub flight_id: FlightId,
    pub seat_id: SeatId,
    pub status: BookingStatus,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Booking row as written by the confirmation engine, before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Option<UserId>,
    pub flight_id: FlightId,
    pub seat_id: SeatId,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}
