use anyhow::Context;
use seatline_api::{app, state::AppState};
use seatline_core::{
    BridgeConfig, ConfirmationEngine, DistributionBridge, EventPublisher, HoldManager, ObserverRegistry,
    PaymentEngine,
};
use seatline_store::{app_config::Config, seed, DbClient, PgReservationStore, RedisClient, RedisEventBus};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seatline_api=debug,seatline_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Seatline API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    if config.seed.demo_data {
        seed::seed_demo_flight(&db.pool)
            .await
            .context("Failed to seed demo data")?;
    }

    // Redis: seat holds and the event channel
    let redis = RedisClient::new(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?;
    let bus = Arc::new(RedisEventBus::new(redis.client().clone()));

    let store = Arc::new(PgReservationStore::new(db.pool.clone(), config.database.lock_timeout()));
    let events = EventPublisher::new(bus.clone(), config.events.topic.clone());
    // The bridge reads the same topic the engines publish to
    let bridge_config = BridgeConfig {
        topic: events.topic().to_string(),
        resubscribe_delay: config.bridge.resubscribe_delay(),
    };
    let holds = Arc::new(
        HoldManager::new(Arc::new(redis), events.clone()).with_default_ttl(config.rules.hold_ttl_seconds),
    );
    let confirmations = Arc::new(ConfirmationEngine::new(store.clone(), holds.clone(), events.clone()));
    let payments = Arc::new(PaymentEngine::new(store.clone(), events));
    let observers = Arc::new(ObserverRegistry::new(
        config.observers.queue_capacity,
        config.observers.send_timeout(),
    ));

    let bridge = DistributionBridge::spawn(bus, observers.clone(), bridge_config);

    let app_state = AppState {
        store,
        holds,
        confirmations,
        payments,
        observers,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    bridge.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
