pub mod bridge;
pub mod bus;
pub mod confirmation;
pub mod hold;
pub mod memory;
pub mod observers;
pub mod payment;
pub mod store;

pub use bridge::{BridgeConfig, BridgeHandle, DistributionBridge};
pub use bus::{BusError, EventBus, EventPublisher, MessageStream};
pub use confirmation::{ConfirmError, ConfirmationEngine};
pub use hold::{HoldError, HoldManager};
pub use observers::{Broadcast, ObserverId, ObserverRegistry};
pub use payment::{PaymentEngine, PaymentError};
pub use store::{DurableStore, LockStore, LockStoreError, SeatTransaction, StoreError};
