use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use seatline_shared::{BookingId, PaymentId};
use serde::{Deserialize, Serialize};

use crate::error::{payment_error, AppError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct SimulatePaymentRequest {
    booking_id: BookingId,
    amount_cents: i64,
    idempotency_key: String,
}

#[derive(Debug, Serialize)]
struct PaymentResponse {
    status: &'static str,
    payment_id: PaymentId,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/payments/simulate", post(simulate_payment))
}

async fn simulate_payment(
    State(state): State<AppState>,
    Json(req): Json<SimulatePaymentRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment = state
        .payments
        .pay(req.booking_id, req.amount_cents, &req.idempotency_key)
        .await
        .map_err(payment_error)?;

    Ok(Json(PaymentResponse { status: "ok", payment_id: payment.id }))
}
