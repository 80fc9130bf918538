//! Background worker that forwards seat events from the bus to observers.
//!
//! Lifecycle: [`DistributionBridge::spawn`] starts the worker on the current
//! runtime and returns a [`BridgeHandle`]. [`BridgeHandle::shutdown`] stops
//! it: a broadcast already in progress completes, anything not yet pulled
//! from the subscription is abandoned.
//!
//! Restart policy: when subscribing fails or the subscription stream ends
//! (for example a dropped broker connection), the worker logs it, waits
//! `resubscribe_delay` and subscribes again. Messages published while it is
//! not subscribed are lost, which is consistent with at-most-once delivery.

use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::bus::EventBus;
use crate::observers::Broadcast;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub topic: String,
    pub resubscribe_delay: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            topic: "seat_events".to_string(),
            resubscribe_delay: Duration::from_secs(1),
        }
    }
}

pub struct BridgeHandle {
    shutdown: watch::Sender<bool>,
    subscribed: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl BridgeHandle {
    /// Resolves once the worker holds a live subscription.
    pub async fn subscribed(&self) {
        let mut subscribed = self.subscribed.clone();
        // Err means the worker already exited; nothing left to wait for.
        let _ = subscribed.wait_for(|ready| *ready).await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Distribution bridge task failed: {}", e);
        }
    }
}

pub struct DistributionBridge;

impl DistributionBridge {
    pub fn spawn(bus: Arc<dyn EventBus>, sink: Arc<dyn Broadcast>, config: BridgeConfig) -> BridgeHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (subscribed_tx, subscribed_rx) = watch::channel(false);
        let task = tokio::spawn(run(bus, sink, config, shutdown_rx, subscribed_tx));
        BridgeHandle {
            shutdown: shutdown_tx,
            subscribed: subscribed_rx,
            task,
        }
    }
}

async fn run(
    bus: Arc<dyn EventBus>,
    sink: Arc<dyn Broadcast>,
    config: BridgeConfig,
    mut shutdown: watch::Receiver<bool>,
    subscribed: watch::Sender<bool>,
) {
    info!("Distribution bridge started on topic {}", config.topic);

    while !*shutdown.borrow() {
        let subscription = tokio::select! {
            _ = shutdown.changed() => break,
            result = bus.subscribe(&config.topic) => result,
        };

        match subscription {
            Ok(mut stream) => {
                subscribed.send_replace(true);
                debug!("Distribution bridge subscribed to {}", config.topic);
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => {
                            info!("Distribution bridge stopping");
                            return;
                        }
                        next = stream.next() => match next {
                            Some(message) => forward(sink.as_ref(), &message).await,
                            None => {
                                warn!("Subscription to {} ended, resubscribing", config.topic);
                                break;
                            }
                        }
                    }
                }
                subscribed.send_replace(false);
            }
            Err(e) => error!("Failed to subscribe to {}: {}", config.topic, e),
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(config.resubscribe_delay) => {}
        }
    }

    info!("Distribution bridge stopped");
}

async fn forward(sink: &dyn Broadcast, message: &str) {
    if let Err(e) = serde_json::from_str::<serde_json::Value>(message) {
        warn!("Dropping non-JSON message from bus: {}", e);
        return;
    }
    let delivered = sink.broadcast(message).await;
    debug!("Forwarded event to {} observers", delivered);
}
