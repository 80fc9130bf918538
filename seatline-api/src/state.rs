use seatline_core::{ConfirmationEngine, DurableStore, HoldManager, ObserverRegistry, PaymentEngine};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DurableStore>,
    pub holds: Arc<HoldManager>,
    pub confirmations: Arc<ConfirmationEngine>,
    pub payments: Arc<PaymentEngine>,
    pub observers: Arc<ObserverRegistry>,
}
