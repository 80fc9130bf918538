pub mod models;

pub use models::events::SeatEvent;
pub use models::payment::{NewPayment, Payment, PaymentStatus};
pub use models::reservation::{Booking, BookingStatus, Flight, NewBooking, Seat};

pub type FlightId = i64;
pub type SeatId = i64;
pub type BookingId = i64;
pub type PaymentId = i64;
pub type UserId = i64;
