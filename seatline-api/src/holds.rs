use axum::{
    extract::{Json, Path, State},
    routing::post,
    Router,
};
use seatline_shared::FlightId;
use serde::Serialize;
use tracing::info;

use crate::error::{hold_error, AppError};
use crate::state::AppState;
use crate::user::SeatActionRequest;

#[derive(Debug, Serialize)]
struct HoldResponse {
    result: &'static str,
    expires_in: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/flights/{flight_id}/seats/{seat_code}/hold", post(hold_seat))
}

async fn hold_seat(
    State(state): State<AppState>,
    Path((flight_id, seat_code)): Path<(FlightId, String)>,
    Json(req): Json<SeatActionRequest>,
) -> Result<Json<HoldResponse>, AppError> {
    let holder = req.user_id.into_string();
    let held = state
        .holds
        .try_hold_default(flight_id, &seat_code, &holder)
        .await
        .map_err(hold_error)?;

    if !held {
        return Err(AppError::ConflictError("seat already held/booked".to_string()));
    }

    info!("Seat {} on flight {} held for {}", seat_code, flight_id, holder);
    Ok(Json(HoldResponse {
        result: "held",
        expires_in: state.holds.default_ttl_seconds(),
    }))
}
