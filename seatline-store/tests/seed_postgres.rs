//! Runs against a real PostgreSQL when `SEATLINE_TEST_DATABASE_URL` is set,
//! and is a no-op otherwise.

use seatline_store::app_config::DatabaseConfig;
use seatline_store::seed::{seed_demo_flight, DEMO_FLIGHT_NUMBER};
use seatline_store::DbClient;

async fn test_db() -> Option<DbClient> {
    let url = std::env::var("SEATLINE_TEST_DATABASE_URL").ok()?;
    let config = DatabaseConfig {
        url,
        max_connections: 5,
        acquire_timeout_ms: 3000,
        lock_timeout_ms: 5000,
    };
    let db = DbClient::new(&config).await.unwrap();
    db.migrate().await.unwrap();
    Some(db)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_seeders_create_one_flight() {
    let Some(db) = test_db().await else {
        return;
    };

    let (a, b, c) = tokio::join!(
        seed_demo_flight(&db.pool),
        seed_demo_flight(&db.pool),
        seed_demo_flight(&db.pool)
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
    assert_eq!(a, b);
    assert_eq!(b, c);

    let flights: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM flights WHERE flight_number = $1")
        .bind(DEMO_FLIGHT_NUMBER)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(flights, 1);

    let seats: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seats WHERE flight_id = $1")
        .bind(a)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(seats, 20);
}
