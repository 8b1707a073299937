use crate::cache::PaymentLinkCache;
use crate::errors::ServiceError;
use crate::metrics::{
    NOTIFICATIONS_RECEIVED, RELAYS_FAILED, RELAYS_SENT, TRANSACTIONS_CREATED,
    TRANSACTIONS_REPLAYED,
};
use crate::models::{
    CanonicalOrder, GatewayNotification, PaymentRecord, PaymentState, PlatformOrderId,
    StatusUpdate,
};
use crate::services::gateway::PaymentGateway;
use crate::services::platform::{CommercePlatform, OrderUpdate};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use url::Url;

/// Couples the payment gateway, the payment-link cache and the (optional)
/// commerce platform.
///
/// Transaction creation is idempotent per order id: a cached record is
/// replayed instead of calling the gateway again. Everything sent back to the
/// platform is best effort and never fails the caller.
#[derive(Clone)]
pub struct GatewayBridge {
    gateway: Arc<dyn PaymentGateway>,
    platform: Option<Arc<dyn CommercePlatform>>,
    cache: PaymentLinkCache,
}

impl GatewayBridge {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        platform: Option<Arc<dyn CommercePlatform>>,
        cache: PaymentLinkCache,
    ) -> Self {
        Self {
            gateway,
            platform,
            cache,
        }
    }

    pub fn platform(&self) -> Option<&Arc<dyn CommercePlatform>> {
        self.platform.as_ref()
    }

    pub fn cache(&self) -> &PaymentLinkCache {
        &self.cache
    }

    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn create_transaction(
        &self,
        order: &CanonicalOrder,
    ) -> Result<PaymentRecord, ServiceError> {
        if let Some(existing) = self.cache.get(&order.id).await {
            TRANSACTIONS_REPLAYED.inc();
            info!(state = ?existing.state, "Replaying cached transaction");
            return Ok(existing);
        }

        let result = match self.gateway.create_transaction(order).await {
            Ok(result) => result,
            Err(err) if err.is_gateway_conflict() => {
                // A concurrent delivery of the same order may have won the race
                if let Some(existing) = self.cache.get(&order.id).await {
                    TRANSACTIONS_REPLAYED.inc();
                    info!("Gateway reported duplicate order id; replaying cached transaction");
                    return Ok(existing);
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let record = PaymentRecord {
            order_id: order.id.clone(),
            result,
            state: PaymentState::AwaitingPayment,
        };
        self.cache.insert(order.id.clone(), record.clone()).await;
        TRANSACTIONS_CREATED.inc();
        info!(
            redirect_url = record.result.redirect_url.as_ref().map(Url::as_str),
            "Transaction created"
        );

        Ok(record)
    }

    /// Cached payment record for `order_id`, if any.
    pub async fn lookup(&self, order_id: &str) -> Option<PaymentRecord> {
        self.cache.get(order_id).await
    }

    /// Derives the status from a gateway notification, advances the cached
    /// payment state and relays the status to the platform.
    #[instrument(skip(self, notification), fields(order_id = %notification.order_id))]
    pub async fn apply_notification(&self, notification: &GatewayNotification) -> StatusUpdate {
        NOTIFICATIONS_RECEIVED.inc();
        let update = StatusUpdate::from_notification(notification);

        let advanced = self
            .cache
            .update(&update.order_id, |record| {
                record.state = record.state.apply(update.financial_status);
            })
            .await;
        match advanced {
            Some(record) => info!(
                status = %update.financial_status,
                state = ?record.state,
                "Payment state advanced"
            ),
            None => info!(
                status = %update.financial_status,
                "Notification for an order without a cached payment link"
            ),
        }

        self.relay_status(&update).await;
        update
    }

    /// Writes the payment status onto the platform order. Best effort.
    pub async fn relay_status(&self, update: &StatusUpdate) {
        let order_update = OrderUpdate::with_status(update.note.clone(), update.financial_status);
        self.relay(&update.order_id, &order_update).await;
    }

    /// Writes the payment link onto the platform order note. Best effort.
    pub async fn relay_payment_link(&self, order_id: &str, redirect_url: &Url) {
        let order_update = OrderUpdate::note(format!("Payment link: {}", redirect_url));
        self.relay(order_id, &order_update).await;
    }

    async fn relay(&self, order_id: &str, update: &OrderUpdate) {
        let Some(platform) = self.platform.as_ref() else {
            info!(order_id, "Platform integration not configured; skipping relay");
            return;
        };
        let Some(platform_id) = PlatformOrderId::parse(order_id) else {
            info!(order_id, "Not a platform order id; skipping relay");
            return;
        };

        match platform.update_order(&platform_id, update).await {
            Ok(()) => {
                RELAYS_SENT.inc();
                info!(order_id = %platform_id, "Relayed update to platform");
            }
            Err(err) => {
                RELAYS_FAILED.inc();
                warn!(order_id = %platform_id, error = %err, "Failed to relay update to platform");
            }
        }
    }
}
