use chrono::{Duration, Utc};
use seatline_shared::FlightId;
use sqlx::PgPool;
use tracing::info;

pub const DEMO_FLIGHT_NUMBER: &str = "F100";

/// Seat codes `1A`..`5D`, row-major.
pub fn demo_seat_codes() -> Vec<String> {
    (1..=5)
        .flat_map(|row| ['A', 'B', 'C', 'D'].into_iter().map(move |col| format!("{}{}", row, col)))
        .collect()
}

/// Creates the demo flight and its seats unless `F100` already exists.
/// Returns the flight id either way. Safe to run from several processes at
/// once: the unique flight number decides which one inserts.
pub async fn seed_demo_flight(pool: &PgPool) -> Result<FlightId, sqlx::Error> {
    let depart_at = Utc::now() + Duration::days(1);
    let arrive_at = depart_at + Duration::hours(12);

    let mut tx = pool.begin().await?;

    // 1. Claim the flight number; a concurrent seeder waits here until we commit
    let inserted: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO flights (flight_number, origin, destination, depart_at, arrive_at)
        VALUES ($1, 'DEL', 'AKL', $2, $3)
        ON CONFLICT (flight_number) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(DEMO_FLIGHT_NUMBER)
    .bind(depart_at)
    .bind(arrive_at)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(flight_id) = inserted else {
        let existing: i64 = sqlx::query_scalar("SELECT id FROM flights WHERE flight_number = $1")
            .bind(DEMO_FLIGHT_NUMBER)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        info!("Demo flight {} already present (id {})", DEMO_FLIGHT_NUMBER, existing);
        return Ok(existing);
    };

    // 2. Seats
    let codes = demo_seat_codes();
    for code in &codes {
        sqlx::query(
            r#"
            INSERT INTO seats (flight_id, seat_code, seat_class)
            VALUES ($1, $2, 'economy')
            ON CONFLICT (flight_id, seat_code) DO NOTHING
            "#,
        )
        .bind(flight_id)
        .bind(code)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!("Seeded demo flight {} (id {}) with {} seats", DEMO_FLIGHT_NUMBER, flight_id, codes.len());
    Ok(flight_id)
}
