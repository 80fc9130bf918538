pub mod events;
pub mod payment;
pub mod reservation;
