use axum::{
    extract::{Json, Path, State},
    routing::post,
    Router,
};
use seatline_shared::{BookingId, FlightId};
use serde::Serialize;

use crate::error::{confirm_error, AppError};
use crate::state::AppState;
use crate::user::SeatActionRequest;

#[derive(Debug, Serialize)]
struct BookingResponse {
    result: &'static str,
    booking_id: BookingId,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/flights/{flight_id}/seats/{seat_code}/confirm", post(confirm_seat))
}

async fn confirm_seat(
    State(state): State<AppState>,
    Path((flight_id, seat_code)): Path<(FlightId, String)>,
    Json(req): Json<SeatActionRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let user_id = req.user_id.into_string();

    let booking_id = state
        .confirmations
        .confirm(flight_id, &seat_code, &user_id)
        .await
        .map_err(confirm_error)?;

    Ok(Json(BookingResponse { result: "booked", booking_id }))
}
