//! Data types shared by the normalizer, the gateway bridge and the HTTP layer.

pub mod order;
pub mod payment;

pub use order::{CanonicalOrder, Customer, LineItem, OrderSource, PlatformOrderId};
pub use payment::{
    FinancialStatus, GatewayNotification, GatewayTransactionResult, PaymentRecord, PaymentState,
    StatusUpdate,
};
