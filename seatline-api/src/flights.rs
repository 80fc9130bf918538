use axum::{
    extract::{Json, Path, State},
    routing::get,
    Router,
};
use seatline_shared::{FlightId, Seat, SeatId};
use serde::Serialize;

use crate::error::{store_error, AppError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct SeatView {
    id: SeatId,
    seat_code: String,
    seat_class: String,
}

impl From<Seat> for SeatView {
    fn from(seat: Seat) -> Self {
        Self {
            id: seat.id,
            seat_code: seat.seat_code,
            seat_class: seat.seat_class,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/flights/{flight_id}/seats", get(list_seats))
}

async fn list_seats(
    State(state): State<AppState>,
    Path(flight_id): Path<FlightId>,
) -> Result<Json<Vec<SeatView>>, AppError> {
    let seats = state.store.list_seats(flight_id).await.map_err(store_error)?;
    Ok(Json(seats.into_iter().map(SeatView::from).collect()))
}
