use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Duration;
use tracing::debug;
use uuid::Uuid;

pub type ObserverId = Uuid;

/// Delivery side of the bridge: hands one message to every live observer.
#[async_trait]
pub trait Broadcast: Send + Sync {
    /// Returns how many observers accepted the message.
    async fn broadcast(&self, message: &str) -> usize;
}

/// Live observers keyed by connection id.
///
/// Each observer owns a bounded FIFO queue drained by its connection task.
/// A broadcast works on a snapshot of the map, so observers may come and go
/// while it runs. An observer whose queue is closed or stays full past the
/// send timeout is dropped; the others are unaffected.
pub struct ObserverRegistry {
    observers: RwLock<HashMap<ObserverId, mpsc::Sender<Arc<str>>>>,
    queue_capacity: usize,
    send_timeout: Duration,
}

impl ObserverRegistry {
    pub fn new(queue_capacity: usize, send_timeout: Duration) -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
            send_timeout,
        }
    }

    pub async fn register(&self) -> (ObserverId, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = Uuid::new_v4();
        self.observers.write().await.insert(id, tx);
        debug!("Observer {} registered", id);
        (id, rx)
    }

    pub async fn deregister(&self, id: ObserverId) -> bool {
        let removed = self.observers.write().await.remove(&id).is_some();
        if removed {
            debug!("Observer {} deregistered", id);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.observers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.observers.read().await.is_empty()
    }
}

#[async_trait]
impl Broadcast for ObserverRegistry {
    async fn broadcast(&self, message: &str) -> usize {
        let snapshot: Vec<(ObserverId, mpsc::Sender<Arc<str>>)> = self
            .observers
            .read()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();
        if snapshot.is_empty() {
            return 0;
        }

        let message: Arc<str> = Arc::from(message);
        let deliveries = snapshot.into_iter().map(|(id, tx)| {
            let message = message.clone();
            let timeout = self.send_timeout;
            async move { (id, tx.send_timeout(message, timeout).await.is_ok()) }
        });
        let results = join_all(deliveries).await;

        let dead: Vec<ObserverId> = results.iter().filter(|(_, ok)| !ok).map(|(id, _)| *id).collect();
        if !dead.is_empty() {
            let mut observers = self.observers.write().await;
            for id in &dead {
                observers.remove(id);
                debug!("Observer {} dropped after failed delivery", id);
            }
        }

        results.len() - dead.len()
    }
}
